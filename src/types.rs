use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tabled::Tabled;
use url::Url;

use crate::error::AnalysisError;

/// Application credentials registered with the provider.
///
/// Validated once at construction and never mutated afterwards. The `Debug`
/// implementation masks the secret so credentials can be logged safely.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Result<Self, AnalysisError> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        let redirect_uri = redirect_uri.into();

        if client_id.trim().is_empty() {
            return Err(AnalysisError::Configuration(
                "client id must not be empty".to_string(),
            ));
        }
        if client_secret.trim().is_empty() {
            return Err(AnalysisError::Configuration(
                "client secret must not be empty".to_string(),
            ));
        }
        if redirect_uri.trim().is_empty() {
            return Err(AnalysisError::Configuration(
                "redirect uri must not be empty".to_string(),
            ));
        }
        Url::parse(&redirect_uri).map_err(|e| {
            AnalysisError::Configuration(format!("redirect uri '{redirect_uri}' is invalid: {e}"))
        })?;

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// The redirect URI exactly as configured. The token exchange must send
    /// this same string that was used to obtain the code.
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &crate::utils::truncate_secret(&self.client_id))
            .field("client_secret", &"********")
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// Authorization code handed back by the provider after the user logged in.
#[derive(Debug)]
pub struct AuthorizationGrant {
    pub code: String,
    pub received_at: DateTime<Utc>,
}

impl AuthorizationGrant {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            received_at: Utc::now(),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub obtained_at: u64,
    pub expires_in: u64,
}

impl AccessToken {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp() as u64)
    }

    /// Tokens are treated as expired four minutes ahead of the provider's deadline.
    pub fn is_expired_at(&self, now: u64) -> bool {
        now.saturating_add(240) >= self.obtained_at.saturating_add(self.expires_in)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &crate::utils::truncate_secret(&self.value))
            .field("obtained_at", &self.obtained_at)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Token endpoint payload.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_expires_in() -> u64 {
    3600
}

/// Error payload returned by the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenErrorResponse {
    pub error: String,
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopTracksResponse {
    pub items: Vec<Track>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistTracksResponse {
    pub items: Vec<PlaylistItem>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistItem {
    pub track: Option<PlaylistTrack>,
}

/// Playlist entries may be local files or episodes without an id.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistTrack {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// Provider computed descriptors for a single track. Any field may be null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatureVector {
    #[serde(rename = "id", default)]
    pub track_id: String,
    #[serde(default)]
    pub danceability: Option<f64>,
    #[serde(default)]
    pub energy: Option<f64>,
    #[serde(default)]
    pub loudness: Option<f64>,
    #[serde(default)]
    pub speechiness: Option<f64>,
    #[serde(default)]
    pub acousticness: Option<f64>,
    #[serde(default)]
    pub instrumentalness: Option<f64>,
    #[serde(default)]
    pub liveness: Option<f64>,
    #[serde(default)]
    pub valence: Option<f64>,
    #[serde(default)]
    pub tempo: Option<f64>,
    #[serde(default)]
    pub key: Option<f64>,
    #[serde(default)]
    pub mode: Option<f64>,
    #[serde(default)]
    pub time_signature: Option<f64>,
    #[serde(default)]
    pub duration_ms: Option<f64>,
}

impl AudioFeatureVector {
    /// Values in the order of [`crate::analysis::FEATURE_COLUMNS`].
    pub fn values(&self) -> Vec<Option<f64>> {
        vec![
            self.danceability,
            self.energy,
            self.loudness,
            self.speechiness,
            self.acousticness,
            self.instrumentalness,
            self.liveness,
            self.valence,
            self.tempo,
            self.key,
            self.mode,
            self.time_signature,
            self.duration_ms,
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioFeaturesResponse {
    pub audio_features: Vec<Option<AudioFeatureVector>>,
}

#[derive(Tabled)]
pub struct FeatureTableRow {
    pub track: String,
    pub danceability: String,
    pub energy: String,
    pub loudness: String,
    pub speechiness: String,
    pub acousticness: String,
    pub instrumentalness: String,
    pub liveness: String,
    pub valence: String,
    pub tempo: String,
    pub key: String,
    pub mode: String,
    pub time_signature: String,
    pub duration_ms: String,
}
