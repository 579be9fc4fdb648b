//! Error taxonomy for the analysis pipeline.
//!
//! Every component returns [`AnalysisError`] instead of panicking or substituting
//! defaults. The only place that reacts to an error by changing state is
//! [`crate::session::Session::settle`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Missing or malformed credentials/endpoints. Raised before any network call.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The token endpoint refused the grant (bad, expired or already used code).
    #[error("token exchange failed ({status_code}): {provider_message}")]
    AuthExchange {
        status_code: u16,
        provider_message: String,
    },

    /// The provider redirected back with an error instead of a code.
    #[error("authorization denied: {error}{}", parenthesized(.description))]
    AuthorizationDenied {
        error: String,
        description: Option<String>,
    },

    /// Non-2xx answer from a read endpoint. `exhausted` is set when the retry
    /// budget ran out (rate limit, server error or network failure).
    #[error("api error{}: {message}{}", status_suffix(.status), exhausted_suffix(.exhausted))]
    Api {
        status: Option<u16>,
        message: String,
        exhausted: bool,
    },

    #[error("no tracks to analyze")]
    EmptyResult,

    #[error("column '{column}' is not present in the feature table")]
    ColumnMissing { column: String },

    #[error("fetching audio features for batch {batch} failed: {source}")]
    FeatureFetch {
        batch: usize,
        #[source]
        source: Box<AnalysisError>,
    },

    /// No usable access token in the session.
    #[error("not authenticated, run the login flow again")]
    Unauthenticated,

    #[error("network error: {0}")]
    Network(String),

    #[error("cannot decode provider response: {0}")]
    Decode(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl AnalysisError {
    /// Whether the session token should be dropped after this error.
    ///
    /// Every failure downstream of authorization resets the session, except a
    /// caller initiated cancellation.
    pub fn resets_session(&self) -> bool {
        !matches!(self, AnalysisError::Cancelled)
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, AnalysisError::Api { exhausted: true, .. })
    }
}

fn parenthesized(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(" ({d})"))
        .unwrap_or_default()
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

fn exhausted_suffix(exhausted: &bool) -> &'static str {
    if *exhausted { " [retries exhausted]" } else { "" }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AnalysisError::Decode(err.to_string())
        } else {
            AnalysisError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        AnalysisError::Decode(err.to_string())
    }
}
