mod common;

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{
        HeaderMap, StatusCode,
        header::{AUTHORIZATION, HOST, RETRY_AFTER},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use reqwest::Client;
use serde_json::{Value, json};

use trackscope::{
    analysis::{DEFAULT_CORRELATION_COLUMNS, TrackSource, run_analysis},
    error::AnalysisError,
    session::Session,
    spotify::{
        fetch::{CancelSignal, RateLimitedFetcher, RetryPolicy},
        tracks::TimeRange,
    },
};

const MISSING_FEATURES: [&str; 2] = ["t7", "t33"];

#[derive(Default)]
struct MockApi {
    top_tracks_status: Option<StatusCode>,
    rate_limit_first_features_call: bool,
    feature_calls: AtomicUsize,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) == Some("Bearer test-token")
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"status": 401, "message": "Invalid access token"}})),
    )
        .into_response()
}

// Helper function to derive deterministic features from a track id
fn features_for(id: &str) -> Value {
    let i: f64 = id.trim_start_matches('t').parse().unwrap_or(0.0);
    json!({
        "id": id,
        "danceability": i / 50.0,
        "energy": 1.0 - i / 50.0,
        "loudness": -20.0 + i * 0.2,
        "speechiness": ((i * 3.0) % 7.0) / 7.0,
        "acousticness": ((i * 5.0) % 11.0) / 11.0,
        "instrumentalness": (i % 4.0) / 4.0,
        "liveness": ((i * 7.0) % 13.0) / 13.0,
        "valence": (i * i) / 2500.0,
        "tempo": 90.0 + i,
        "key": i % 12.0,
        "mode": i % 2.0,
        "time_signature": 4,
        "duration_ms": 180000 + (i as u64) * 1000,
    })
}

async fn top_tracks(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if let Some(status) = api.top_tracks_status {
        let body = json!({"error": {"status": status.as_u16(), "message": "mocked failure"}});
        return (status, Json(body)).into_response();
    }

    let limit: usize = query.get("limit").and_then(|l| l.parse().ok()).unwrap_or(20);
    if query.get("time_range").map(String::as_str) != Some("long_term") {
        return (StatusCode::BAD_REQUEST, "unexpected time range").into_response();
    }

    let items: Vec<Value> = (0..limit)
        .map(|i| json!({"id": format!("t{i}"), "name": format!("Track {i}"), "popularity": 50}))
        .collect();
    Json(json!({"items": items, "total": limit})).into_response()
}

async fn audio_features(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }

    let call = api.feature_calls.fetch_add(1, Ordering::SeqCst);
    if api.rate_limit_first_features_call && call == 0 {
        return (StatusCode::TOO_MANY_REQUESTS, [(RETRY_AFTER, "0")], "").into_response();
    }

    let ids: Vec<&str> = query
        .get("ids")
        .map(|ids| ids.split(',').collect())
        .unwrap_or_default();
    if ids.len() > 100 {
        return (StatusCode::BAD_REQUEST, "too many ids").into_response();
    }

    let features: Vec<Value> = ids
        .iter()
        .map(|id| {
            if MISSING_FEATURES.contains(id) {
                Value::Null
            } else {
                features_for(id)
            }
        })
        .collect();
    Json(json!({"audio_features": features})).into_response()
}

async fn playlist_tracks(
    Path(id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }

    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let page = if query.contains_key("offset") {
        json!({
            "items": [
                {"track": {"id": "t3", "name": "Track 3"}},
                {"track": {"id": "t4", "name": "Track 4"}},
            ],
            "next": null,
        })
    } else {
        json!({
            "items": [
                {"track": {"id": "t1", "name": "Track 1"}},
                {"track": null},
                {"track": {"id": null, "name": "Local file"}},
                {"track": {"id": "t2", "name": "Track 2"}},
            ],
            "next": format!("http://{host}/v1/playlists/{id}/tracks?offset=4&limit=100"),
        })
    };
    Json(page).into_response()
}

async fn mock_api(api: MockApi) -> (String, Arc<MockApi>) {
    let api = Arc::new(api);
    let app = Router::new()
        .route("/v1/me/top/tracks", get(top_tracks))
        .route("/v1/audio-features", get(audio_features))
        .route("/v1/playlists/{id}/tracks", get(playlist_tracks))
        .with_state(Arc::clone(&api));
    let base = common::spawn_mock(app).await;
    (format!("{base}/v1"), api)
}

// Helper function to create a fetcher with short waits
fn fetcher() -> RateLimitedFetcher {
    RateLimitedFetcher::new(RetryPolicy {
        max_retries: 3,
        default_retry_after: Duration::from_millis(10),
        transient_delay: Duration::from_millis(10),
    })
}

fn top_tracks_source() -> TrackSource {
    TrackSource::TopTracks {
        limit: 50,
        time_range: TimeRange::Long,
    }
}

#[tokio::test]
async fn test_top_tracks_analysis() {
    let (api_url, api) = mock_api(MockApi::default()).await;
    let mut session = Session::with_token(common::fresh_token());
    let mut fetcher = fetcher();

    let report = run_analysis(
        &mut session,
        &Client::new(),
        &api_url,
        &mut fetcher,
        &top_tracks_source(),
        &DEFAULT_CORRELATION_COLUMNS,
    )
    .await
    .unwrap();

    assert_eq!(report.tracks.len(), 50);
    assert_eq!(report.table.len(), 48);
    assert_eq!(report.dropped, 2);
    assert!(!report.table.names().any(|n| n == "Track 7" || n == "Track 33"));
    // 50 ids fit into a single batch
    assert_eq!(api.feature_calls.load(Ordering::SeqCst), 1);

    let matrix = &report.correlation;
    assert_eq!(matrix.len(), 8);
    assert!(matrix.is_symmetric());
    for i in 0..matrix.len() {
        assert_eq!(matrix.values()[i][i], 1.0);
    }
    assert!((matrix.get("danceability", "energy").unwrap() + 1.0).abs() < 1e-9);
    assert!((matrix.get("danceability", "loudness").unwrap() - 1.0).abs() < 1e-9);

    assert!(session.is_authenticated());
}

#[tokio::test]
async fn test_rate_limited_feature_request_is_retried() {
    let (api_url, api) = mock_api(MockApi {
        rate_limit_first_features_call: true,
        ..MockApi::default()
    })
    .await;
    let mut session = Session::with_token(common::fresh_token());
    let mut fetcher = fetcher();

    let report = run_analysis(
        &mut session,
        &Client::new(),
        &api_url,
        &mut fetcher,
        &top_tracks_source(),
        &["energy", "valence"],
    )
    .await
    .unwrap();

    assert_eq!(report.table.len(), 48);
    assert_eq!(fetcher.waits(), 1);
    assert_eq!(api.feature_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_api_failure_resets_session() {
    let (api_url, _) = mock_api(MockApi {
        top_tracks_status: Some(StatusCode::FORBIDDEN),
        ..MockApi::default()
    })
    .await;
    let mut session = Session::with_token(common::fresh_token());
    let mut fetcher = fetcher();

    let result = run_analysis(
        &mut session,
        &Client::new(),
        &api_url,
        &mut fetcher,
        &top_tracks_source(),
        &DEFAULT_CORRELATION_COLUMNS,
    )
    .await;

    assert!(matches!(
        result,
        Err(AnalysisError::Api {
            status: Some(403),
            exhausted: false,
            ..
        })
    ));
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let (api_url, _) = mock_api(MockApi {
        top_tracks_status: Some(StatusCode::BAD_GATEWAY),
        ..MockApi::default()
    })
    .await;
    let mut session = Session::with_token(common::fresh_token());
    let mut fetcher = fetcher();

    let result = run_analysis(
        &mut session,
        &Client::new(),
        &api_url,
        &mut fetcher,
        &top_tracks_source(),
        &DEFAULT_CORRELATION_COLUMNS,
    )
    .await;

    assert!(result.as_ref().is_err_and(|e| e.is_exhausted()));
    assert_eq!(fetcher.waits(), 2);
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn test_unknown_column_fails_before_any_request() {
    let api_url = common::closed_port_url().await;
    let mut session = Session::with_token(common::fresh_token());
    let mut fetcher = fetcher();

    let result = run_analysis(
        &mut session,
        &Client::new(),
        &api_url,
        &mut fetcher,
        &top_tracks_source(),
        &["energy", "popularity"],
    )
    .await;

    match result {
        Err(AnalysisError::ColumnMissing { column }) => assert_eq!(column, "popularity"),
        other => panic!("expected ColumnMissing, got {other:?}"),
    }
    assert_eq!(fetcher.waits(), 0);
}

#[tokio::test]
async fn test_without_token_is_unauthenticated() {
    let api_url = common::closed_port_url().await;
    let mut session = Session::new();
    let mut fetcher = fetcher();

    let result = run_analysis(
        &mut session,
        &Client::new(),
        &api_url,
        &mut fetcher,
        &top_tracks_source(),
        &DEFAULT_CORRELATION_COLUMNS,
    )
    .await;

    assert!(matches!(result, Err(AnalysisError::Unauthenticated)));
}

#[tokio::test]
async fn test_cancellation_keeps_session() {
    let (api_url, _) = mock_api(MockApi::default()).await;
    let mut session = Session::with_token(common::fresh_token());
    let (handle, signal) = CancelSignal::new();
    let mut fetcher = fetcher().with_cancel(signal);
    handle.cancel();

    let result = run_analysis(
        &mut session,
        &Client::new(),
        &api_url,
        &mut fetcher,
        &top_tracks_source(),
        &DEFAULT_CORRELATION_COLUMNS,
    )
    .await;

    assert!(matches!(result, Err(AnalysisError::Cancelled)));
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn test_playlist_analysis_follows_pages() {
    let (api_url, _) = mock_api(MockApi::default()).await;
    let mut session = Session::with_token(common::fresh_token());
    let mut fetcher = fetcher();

    let report = run_analysis(
        &mut session,
        &Client::new(),
        &api_url,
        &mut fetcher,
        &TrackSource::Playlist("37i9dQZF1DXcBWIGoYBM5M".to_string()),
        &["danceability", "energy"],
    )
    .await
    .unwrap();

    // Entries without a track or an id are skipped
    let ids: Vec<&str> = report.tracks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["t1", "t2", "t3", "t4"]);
    assert_eq!(report.table.len(), 4);
    assert!((report.correlation.get("danceability", "energy").unwrap() + 1.0).abs() < 1e-9);
}
