use std::{
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};

use tokio::time::{Instant, sleep};

use trackscope::{
    error::AnalysisError,
    spotify::fetch::{CancelSignal, RateLimitedFetcher, RawResponse, RetryPolicy, TransportError},
};

// Helper function to build a response the mock request functions hand back
fn ok() -> Result<RawResponse, TransportError> {
    Ok(RawResponse::new(200, r#"{"items": []}"#))
}

fn rate_limited(seconds: u64) -> Result<RawResponse, TransportError> {
    Ok(RawResponse::new(429, "").with_retry_after(seconds))
}

#[tokio::test(start_paused = true)]
async fn test_honors_retry_after() {
    let calls = AtomicU32::new(0);
    let mut fetcher = RateLimitedFetcher::new(RetryPolicy::default());
    let start = Instant::now();

    let response = fetcher
        .fetch_with_retry(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n < 2 { rate_limited(1) } else { ok() } }
        })
        .await
        .unwrap();

    assert!(response.status.is_success());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // Exactly two waits, each as long as the hint
    assert_eq!(fetcher.waits(), 2);
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_default_retry_after_without_header() {
    let calls = AtomicU32::new(0);
    let mut fetcher = RateLimitedFetcher::new(RetryPolicy::default());
    let start = Instant::now();

    fetcher
        .fetch_with_retry(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Ok(RawResponse::new(429, ""))
                } else {
                    ok()
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(fetcher.waits(), 1);
    assert!(start.elapsed() >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_exhausted() {
    let calls = AtomicU32::new(0);
    let mut fetcher = RateLimitedFetcher::new(RetryPolicy::default());

    let result = fetcher
        .fetch_with_retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { rate_limited(1) }
        })
        .await;

    match result {
        Err(e @ AnalysisError::Api { .. }) => {
            assert!(e.is_exhausted());
            assert!(matches!(e, AnalysisError::Api { status: Some(429), .. }));
        }
        other => panic!("expected exhausted Api error, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // No wait after the last attempt
    assert_eq!(fetcher.waits(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_client_error_is_not_retried() {
    let calls = AtomicU32::new(0);
    let mut fetcher = RateLimitedFetcher::new(RetryPolicy::default());

    let result = fetcher
        .fetch_with_retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Ok(RawResponse::new(
                    401,
                    r#"{"error": {"status": 401, "message": "The access token expired"}}"#,
                ))
            }
        })
        .await;

    match result {
        Err(AnalysisError::Api {
            status,
            message,
            exhausted,
        }) => {
            assert_eq!(status, Some(401));
            assert_eq!(message, "The access token expired");
            assert!(!exhausted);
        }
        other => panic!("expected Api error, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(fetcher.waits(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_server_error_is_retried() {
    let calls = AtomicU32::new(0);
    let mut fetcher = RateLimitedFetcher::new(RetryPolicy::default());
    let start = Instant::now();

    fetcher
        .fetch_with_retry(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Ok(RawResponse::new(502, "Bad Gateway"))
                } else {
                    ok()
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(start.elapsed() >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_network_failure_exhausted() {
    let policy = RetryPolicy {
        max_retries: 4,
        ..RetryPolicy::default()
    };
    let calls = AtomicU32::new(0);
    let mut fetcher = RateLimitedFetcher::new(policy);

    let result = fetcher
        .fetch_with_retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TransportError("connection reset".to_string())) }
        })
        .await;

    match result {
        Err(AnalysisError::Api {
            status,
            message,
            exhausted,
        }) => {
            assert_eq!(status, None);
            assert_eq!(message, "connection reset");
            assert!(exhausted);
        }
        other => panic!("expected exhausted Api error, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(fetcher.waits(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_first_attempt() {
    let (handle, signal) = CancelSignal::new();
    handle.cancel();
    let calls = AtomicU32::new(0);
    let mut fetcher = RateLimitedFetcher::new(RetryPolicy::default()).with_cancel(signal);

    let result = fetcher
        .fetch_with_retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { ok() }
        })
        .await;

    assert!(matches!(result, Err(AnalysisError::Cancelled)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_wait() {
    let (handle, signal) = CancelSignal::new();
    let mut fetcher = RateLimitedFetcher::new(RetryPolicy::default()).with_cancel(signal);
    let start = Instant::now();

    tokio::spawn(async move {
        sleep(Duration::from_secs(1)).await;
        handle.cancel();
    });

    let result = fetcher
        .fetch_with_retry(|| async { rate_limited(30) })
        .await;

    assert!(matches!(result, Err(AnalysisError::Cancelled)));
    // Returned long before the 30 second hint ran out
    assert!(start.elapsed() < Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_handle_does_not_cancel() {
    let (handle, signal) = CancelSignal::new();
    drop(handle);
    let calls = AtomicU32::new(0);
    let mut fetcher = RateLimitedFetcher::new(RetryPolicy::default()).with_cancel(signal);

    fetcher
        .fetch_with_retry(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n == 0 { rate_limited(2) } else { ok() } }
        })
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_long_retry_after_is_still_honored() {
    let calls = AtomicU32::new(0);
    let mut fetcher = RateLimitedFetcher::new(RetryPolicy::default());
    let start = Instant::now();

    fetcher
        .fetch_with_retry(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n == 0 { rate_limited(200) } else { ok() } }
        })
        .await
        .unwrap();

    // Above the warning threshold, but waited out in full
    assert!(start.elapsed() >= Duration::from_secs(200));
    assert_eq!(fetcher.waits(), 1);
}
