#![allow(dead_code)]

use axum::Router;
use chrono::Utc;
use tokio::net::TcpListener;

use trackscope::types::{AccessToken, Credentials};

// Helper function to serve a mock provider on an ephemeral local port
pub async fn spawn_mock(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

// Helper function to get an address nothing is listening on
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

pub fn credentials() -> Credentials {
    Credentials::new(
        "client-id",
        "client-secret",
        "http://127.0.0.1:8501/callback",
    )
    .unwrap()
}

pub fn fresh_token() -> AccessToken {
    AccessToken {
        value: "test-token".to_string(),
        obtained_at: Utc::now().timestamp() as u64,
        expires_in: 3600,
    }
}
