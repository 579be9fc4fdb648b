//! Configuration management for trackscope.
//!
//! Values come from environment variables, optionally seeded from a `.env` file in
//! the local data directory:
//! - Linux: `~/.local/share/trackscope/.env`
//! - macOS: `~/Library/Application Support/trackscope/.env`
//! - Windows: `%LOCALAPPDATA%/trackscope/.env`
//!
//! Credentials are required; every other value falls back to Spotify's public
//! endpoints or a sensible default. Missing credentials are reported as
//! [`AnalysisError::Configuration`] before any network request is made.

use std::{env, net::SocketAddr, path::PathBuf};

use url::Url;

use crate::{error::AnalysisError, types::Credentials};

pub const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_SCOPE: &str = "user-top-read";

/// Loads environment variables from the `.env` file in the local data directory.
///
/// Creates the directory if needed. A missing `.env` file is not an error since
/// all values may be provided through the process environment instead.
pub async fn load_env() -> Result<(), String> {
    let path = env_path();
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| e.to_string())?;
    }

    if path.is_file() {
        dotenv::from_path(&path).map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn env_path() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("trackscope/.env");
    path
}

/// Provider endpoints used by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub auth_url: String,
    pub token_url: String,
    pub api_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

impl Endpoints {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            auth_url: non_empty(lookup("SPOTIFY_API_AUTH_URL")).unwrap_or(defaults.auth_url),
            token_url: non_empty(lookup("SPOTIFY_API_TOKEN_URL")).unwrap_or(defaults.token_url),
            api_url: non_empty(lookup("SPOTIFY_API_URL"))
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
        }
    }
}

/// Reads `SPOTIFY_CLIENT_ID`, `SPOTIFY_CLIENT_SECRET` and `REDIRECT_URI`.
pub fn credentials() -> Result<Credentials, AnalysisError> {
    credentials_from(|key| env::var(key).ok())
}

/// Builds [`Credentials`] from an arbitrary variable lookup.
///
/// # Arguments
///
/// * `lookup` - Returns the value of a variable, `None` when it is unset
///
/// # Returns
///
/// Validated credentials; blank values count as missing.
///
/// # Errors
///
/// [`AnalysisError::Configuration`] naming the first missing variable, or the
/// validation failure from [`Credentials::new`].
///
/// # Example
///
/// ```
/// let creds = credentials_from(|key| match key {
///     "SPOTIFY_CLIENT_ID" => Some("id".to_string()),
///     "SPOTIFY_CLIENT_SECRET" => Some("secret".to_string()),
///     "REDIRECT_URI" => Some("http://127.0.0.1:8501/callback".to_string()),
///     _ => None,
/// })?;
/// ```
pub fn credentials_from(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Credentials, AnalysisError> {
    let required = |key: &str| {
        non_empty(lookup(key)).ok_or_else(|| {
            AnalysisError::Configuration(format!("Missing environment variable: {key}"))
        })
    };

    Credentials::new(
        required("SPOTIFY_CLIENT_ID")?,
        required("SPOTIFY_CLIENT_SECRET")?,
        required("REDIRECT_URI")?,
    )
}

/// Scope requested during authorization, `user-top-read` unless overridden.
pub fn spotify_scope() -> String {
    non_empty(env::var("SPOTIFY_API_AUTH_SCOPE").ok())
        .unwrap_or_else(|| DEFAULT_SCOPE.to_string())
}

/// Address the local callback server binds to.
///
/// Uses `SERVER_ADDRESS` when set, otherwise the loopback interface on the port
/// of the redirect URI.
///
/// # Errors
///
/// [`AnalysisError::Configuration`] when `SERVER_ADDRESS` is not a socket
/// address or the redirect URI has no usable port.
pub fn server_addr(credentials: &Credentials) -> Result<SocketAddr, AnalysisError> {
    if let Some(addr) = non_empty(env::var("SERVER_ADDRESS").ok()) {
        return addr
            .parse()
            .map_err(|e| AnalysisError::Configuration(format!("SERVER_ADDRESS '{addr}': {e}")));
    }

    let redirect = Url::parse(credentials.redirect_uri())
        .map_err(|e| AnalysisError::Configuration(e.to_string()))?;
    let port = redirect.port_or_known_default().ok_or_else(|| {
        AnalysisError::Configuration("redirect uri has no port, set SERVER_ADDRESS".to_string())
    })?;
    Ok(SocketAddr::from(([127, 0, 0, 1], port)))
}

/// Path component of the redirect URI, served by the callback server.
pub fn callback_path(credentials: &Credentials) -> Result<String, AnalysisError> {
    let redirect = Url::parse(credentials.redirect_uri())
        .map_err(|e| AnalysisError::Configuration(e.to_string()))?;
    Ok(redirect.path().to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
