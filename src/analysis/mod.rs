//! Turns a track list into a feature table and a correlation matrix.
//!
//! [`run_analysis`] is the whole flow for one request: list the tracks, fetch
//! their audio features in batches, assemble the table and correlate the
//! requested columns. Its outcome is passed through
//! [`Session::settle`](crate::session::Session::settle), so any failure leaves
//! the session unauthenticated.

mod assemble;
mod correlation;
mod table;

pub use assemble::{AssembledTable, assemble};
pub use correlation::{CorrelationMatrix, correlate};
pub use table::{FeatureRow, FeatureTable};

use async_trait::async_trait;
use reqwest::Client;

use crate::{
    error::AnalysisError,
    session::Session,
    spotify::{
        features::SpotifyFeatureSource,
        fetch::RateLimitedFetcher,
        tracks::{self, TimeRange},
    },
    types::{AudioFeatureVector, Track},
};

/// Numeric audio feature columns, in table order.
pub const FEATURE_COLUMNS: [&str; 13] = [
    "danceability",
    "energy",
    "loudness",
    "speechiness",
    "acousticness",
    "instrumentalness",
    "liveness",
    "valence",
    "tempo",
    "key",
    "mode",
    "time_signature",
    "duration_ms",
];

/// Columns correlated by default. Tempo, key, mode, time signature and duration
/// are left out because they are not on a comparable scale.
pub const DEFAULT_CORRELATION_COLUMNS: [&str; 8] = [
    "danceability",
    "energy",
    "loudness",
    "speechiness",
    "acousticness",
    "instrumentalness",
    "liveness",
    "valence",
];

/// Batched provider of audio feature vectors.
///
/// `fetch_batch` answers with one entry per requested id where possible; `None`
/// marks an id without features.
#[async_trait]
pub trait FeatureSource {
    fn batch_size(&self) -> usize;

    async fn fetch_batch(
        &mut self,
        ids: &[String],
    ) -> Result<Vec<Option<AudioFeatureVector>>, AnalysisError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSource {
    TopTracks { limit: u32, time_range: TimeRange },
    Playlist(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub tracks: Vec<Track>,
    pub table: FeatureTable,
    pub dropped: usize,
    pub correlation: CorrelationMatrix,
}

/// Runs one analysis request with the session's token.
pub async fn run_analysis<S: AsRef<str>>(
    session: &mut Session,
    http: &Client,
    api_url: &str,
    fetcher: &mut RateLimitedFetcher,
    source: &TrackSource,
    columns: &[S],
) -> Result<AnalysisReport, AnalysisError> {
    let result = analyze(session, http, api_url, fetcher, source, columns).await;
    session.settle(result)
}

async fn analyze<S: AsRef<str>>(
    session: &mut Session,
    http: &Client,
    api_url: &str,
    fetcher: &mut RateLimitedFetcher,
    source: &TrackSource,
    columns: &[S],
) -> Result<AnalysisReport, AnalysisError> {
    if let Some(column) = columns
        .iter()
        .find(|c| !FEATURE_COLUMNS.contains(&c.as_ref()))
    {
        return Err(AnalysisError::ColumnMissing {
            column: column.as_ref().to_string(),
        });
    }

    let token = session.token()?.clone();

    let tracks = match source {
        TrackSource::TopTracks { limit, time_range } => {
            tracks::get_top_tracks(http, api_url, &token, fetcher, *limit, *time_range).await?
        }
        TrackSource::Playlist(id) => {
            tracks::get_playlist_tracks(http, api_url, &token, fetcher, id).await?
        }
    };

    let mut features = SpotifyFeatureSource {
        http,
        api_url,
        token: &token,
        fetcher,
    };
    let AssembledTable { table, dropped } = assemble(&tracks, &mut features).await?;

    let correlation = correlate(&table, columns)?;

    Ok(AnalysisReport {
        tracks,
        table,
        dropped,
        correlation,
    })
}
