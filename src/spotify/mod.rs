//! # Spotify Integration Module
//!
//! Everything that talks to the provider lives here:
//!
//! ```text
//! analysis pipeline
//!          ↓
//!     ├── auth      authorization URL, code / client credentials exchange, login flow
//!     ├── tracks    top tracks and playlist tracks
//!     └── features  batched audio features
//!          ↓
//!     fetch         retry policy shared by every read (429, 5xx, network)
//!          ↓
//! HTTP Layer (reqwest)
//! ```
//!
//! ## Rate Limiting
//!
//! Reads never call `reqwest` directly; they go through
//! [`fetch::RateLimitedFetcher`] which honors `Retry-After` on 429, retries 5xx
//! and network failures with a fixed delay and fails fast on other 4xx.
//!
//! ## Authentication
//!
//! The authorization code flow signs the token request with the client secret
//! (`Authorization: Basic`). The redirect URI sent with the exchange is the exact
//! configured string that was used when building the authorization URL.

pub mod auth;
pub mod features;
pub mod fetch;
pub mod tracks;

use reqwest::Client;

use crate::{
    error::AnalysisError,
    spotify::fetch::{RateLimitedFetcher, RawResponse},
    types::AccessToken,
};

/// Authenticated GET through the shared retry policy.
pub(crate) async fn get(
    http: &Client,
    url: &str,
    token: &AccessToken,
    fetcher: &mut RateLimitedFetcher,
) -> Result<RawResponse, AnalysisError> {
    fetcher
        .fetch_with_retry(|| async move {
            let response = http.get(url).bearer_auth(&token.value).send().await?;
            RawResponse::from_response(response).await
        })
        .await
}
