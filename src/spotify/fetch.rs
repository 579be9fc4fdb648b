use std::{future::Future, time::Duration};

use reqwest::{Response, StatusCode, header::RETRY_AFTER};
use serde::de::DeserializeOwned;
use tokio::{sync::watch, time::sleep};

use crate::{error::AnalysisError, warning};

/// Retry-After hints above this are honored but reported.
const ABNORMAL_RETRY_AFTER: u64 = 120;

/// Status, rate limit hint and body of a provider response.
///
/// Decoupled from `reqwest::Response` so the retry policy can be driven by any
/// request function, including test doubles.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub retry_after: Option<u64>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    pub async fn from_response(response: Response) -> Result<Self, TransportError> {
        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await?;

        Ok(Self {
            status,
            retry_after,
            body,
        })
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, AnalysisError> {
        serde_json::from_str(&self.body).map_err(AnalysisError::from)
    }

    /// Provider error message from `{"error": {"message": ..}}` or the raw body.
    pub fn message(&self) -> String {
        serde_json::from_str::<serde_json::Value>(&self.body)
            .ok()
            .and_then(|v| {
                v["error"]["message"]
                    .as_str()
                    .or_else(|| v["error_description"].as_str())
                    .or_else(|| v["error"].as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| {
                if self.body.is_empty() {
                    self.status.to_string()
                } else {
                    self.body.clone()
                }
            })
    }
}

/// Connection level failure: timeout, reset, DNS.
#[derive(Debug, Clone)]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError(err.to_string())
    }
}

/// Caller side of a cancellation.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Observed by the fetcher before every attempt and during every backoff wait.
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    pub fn new() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle(tx), CancelSignal(rx))
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Sleeps for `delay` unless cancelled first. A dropped handle can no longer
    /// cancel, so the remaining delay is simply waited out.
    async fn sleep(&mut self, delay: Duration) -> Result<(), AnalysisError> {
        if self.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let pause = sleep(delay);
        tokio::pin!(pause);

        let cancelled = tokio::select! {
            _ = &mut pause => Some(false),
            changed = self.0.wait_for(|cancelled| *cancelled) => changed.ok().map(|_| true),
        };

        match cancelled {
            Some(true) => Err(AnalysisError::Cancelled),
            Some(false) => Ok(()),
            None => {
                pause.await;
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_retries: u32,
    /// Wait used for a 429 without a `Retry-After` header.
    pub default_retry_after: Duration,
    /// Fixed wait after a server error or network failure.
    pub transient_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            default_retry_after: Duration::from_secs(5),
            transient_delay: Duration::from_secs(5),
        }
    }
}

enum Failure {
    RateLimited(Duration),
    Transient { status: Option<u16>, message: String },
}

/// Runs idempotent provider reads with the retry policy shared by every call.
///
/// - 2xx is returned immediately.
/// - 429 waits for the `Retry-After` hint and tries again.
/// - 5xx and network failures wait a fixed delay and try again.
/// - any other 4xx fails right away.
///
/// Once `max_retries` attempts are used up the last failure is returned as
/// [`AnalysisError::Api`] with `exhausted` set.
#[derive(Debug, Clone, Default)]
pub struct RateLimitedFetcher {
    policy: RetryPolicy,
    cancel: Option<CancelSignal>,
    waits: u32,
}

impl RateLimitedFetcher {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            cancel: None,
            waits: 0,
        }
    }

    pub fn with_cancel(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Number of backoff waits performed so far.
    pub fn waits(&self) -> u32 {
        self.waits
    }

    pub async fn fetch_with_retry<F, Fut>(
        &mut self,
        mut request: F,
    ) -> Result<RawResponse, AnalysisError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<RawResponse, TransportError>>,
    {
        let max_attempts = self.policy.max_retries.max(1);
        let mut attempt = 0;

        loop {
            if self.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
                return Err(AnalysisError::Cancelled);
            }
            attempt += 1;

            let failure = match request().await {
                Ok(response) if response.status.is_success() => return Ok(response),
                Ok(response) if response.status == StatusCode::TOO_MANY_REQUESTS => {
                    let delay = response
                        .retry_after
                        .map(Duration::from_secs)
                        .unwrap_or(self.policy.default_retry_after);
                    Failure::RateLimited(delay)
                }
                Ok(response) if response.status.is_server_error() => Failure::Transient {
                    status: Some(response.status.as_u16()),
                    message: response.message(),
                },
                Ok(response) => {
                    return Err(AnalysisError::Api {
                        status: Some(response.status.as_u16()),
                        message: response.message(),
                        exhausted: false,
                    });
                }
                Err(TransportError(message)) => Failure::Transient {
                    status: None,
                    message,
                },
            };

            if attempt >= max_attempts {
                return Err(match failure {
                    Failure::RateLimited(_) => AnalysisError::Api {
                        status: Some(StatusCode::TOO_MANY_REQUESTS.as_u16()),
                        message: format!("rate limited on all {max_attempts} attempts"),
                        exhausted: true,
                    },
                    Failure::Transient { status, message } => AnalysisError::Api {
                        status,
                        message,
                        exhausted: true,
                    },
                });
            }

            let delay = match failure {
                Failure::RateLimited(delay) => {
                    if delay.as_secs() > ABNORMAL_RETRY_AFTER {
                        warning!(
                            "Retry after has reached an abnormal high of {} seconds.",
                            delay.as_secs()
                        );
                    }
                    delay
                }
                Failure::Transient { .. } => self.policy.transient_delay,
            };

            self.pause(delay).await?;
        }
    }

    async fn pause(&mut self, delay: Duration) -> Result<(), AnalysisError> {
        self.waits += 1;
        match self.cancel.as_mut() {
            Some(signal) => signal.sleep(delay).await,
            None => {
                sleep(delay).await;
                Ok(())
            }
        }
    }
}
