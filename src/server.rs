use std::{net::SocketAddr, sync::Arc};

use axum::{Extension, Router, routing::get};
use tokio::{net::TcpListener, sync::Mutex};

use crate::{api, api::CallbackOutcome, error::AnalysisError, warning};

/// Binds the callback listener up front so a busy port fails the login
/// immediately instead of after the callback timeout.
pub async fn bind_callback_listener(addr: SocketAddr) -> Result<TcpListener, AnalysisError> {
    TcpListener::bind(addr).await.map_err(|e| {
        AnalysisError::Configuration(format!("cannot bind callback server on {addr}: {e}"))
    })
}

pub fn router(callback_path: &str, state: Arc<Mutex<Option<CallbackOutcome>>>) -> Router {
    Router::new().route(callback_path, get(api::callback).layer(Extension(state)))
}

pub async fn start_api_server(
    listener: TcpListener,
    callback_path: &str,
    state: Arc<Mutex<Option<CallbackOutcome>>>,
) {
    let app = router(callback_path, state);

    if let Err(e) = axum::serve(listener, app).await {
        warning!("Callback server stopped: {}", e);
    }
}
