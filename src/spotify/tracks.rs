use std::fmt;

use reqwest::Client;

use crate::{
    Res,
    spotify::{fetch::RateLimitedFetcher, get},
    types::{AccessToken, PlaylistTracksResponse, TopTracksResponse, Track},
    warning,
};

/// Maximum page size accepted by `/me/top/tracks`.
pub const TOP_TRACKS_LIMIT: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TimeRange {
    /// Roughly the last four weeks
    Short,
    /// Roughly the last six months
    Medium,
    /// Several years of listening history
    #[default]
    Long,
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            TimeRange::Short => "short_term",
            TimeRange::Medium => "medium_term",
            TimeRange::Long => "long_term",
        };
        f.write_str(value)
    }
}

/// Retrieves the user's top tracks.
///
/// # Arguments
///
/// * `http` - Shared HTTP client
/// * `api_url` - Web API base URL without trailing slash
/// * `token` - User token carrying the `user-top-read` scope
/// * `fetcher` - Retry policy the request runs through
/// * `limit` - Number of tracks, clamped to 1..=50
/// * `time_range` - Listening period the ranking is computed over
///
/// # API Endpoint
///
/// `GET /me/top/tracks?limit=<limit>&time_range=<short_term|medium_term|long_term>`
///
/// # Errors
///
/// - [`AnalysisError::Api`](crate::error::AnalysisError::Api) for a non-2xx
///   answer or an exhausted retry budget
/// - [`AnalysisError::Decode`](crate::error::AnalysisError::Decode) when the body
///   is not a track page
pub async fn get_top_tracks(
    http: &Client,
    api_url: &str,
    token: &AccessToken,
    fetcher: &mut RateLimitedFetcher,
    limit: u32,
    time_range: TimeRange,
) -> Res<Vec<Track>> {
    let url = format!(
        "{api_url}/me/top/tracks?limit={limit}&time_range={time_range}",
        limit = limit.clamp(1, TOP_TRACKS_LIMIT),
    );

    let response = get(http, &url, token, fetcher).await?;
    let json: TopTracksResponse = response.json()?;
    Ok(json.items)
}

/// Retrieves every track of a playlist, following the `next` links.
///
/// Entries without a track object or without an id (local files, unavailable
/// items) cannot carry audio features and are skipped.
///
/// # Arguments
///
/// * `http` - Shared HTTP client
/// * `api_url` - Web API base URL without trailing slash
/// * `token` - Any valid token; public playlists work with client credentials
/// * `fetcher` - Retry policy every page request runs through
/// * `playlist_id` - Bare playlist id, see [`crate::utils::playlist_id_from`]
///
/// # API Endpoint
///
/// `GET /playlists/{id}/tracks?limit=100&fields=items(track(id,name)),next`, then
/// each `next` URL verbatim until it is `null`.
///
/// # Returns
///
/// The tracks in playlist order. A warning reports how many entries were skipped.
///
/// # Errors
///
/// The first failing page aborts the listing with its
/// [`AnalysisError`](crate::error::AnalysisError); earlier pages are discarded.
pub async fn get_playlist_tracks(
    http: &Client,
    api_url: &str,
    token: &AccessToken,
    fetcher: &mut RateLimitedFetcher,
    playlist_id: &str,
) -> Res<Vec<Track>> {
    let mut next = Some(format!(
        "{api_url}/playlists/{playlist_id}/tracks?limit=100&fields=items(track(id,name)),next"
    ));
    let mut tracks = Vec::new();
    let mut skipped = 0usize;

    while let Some(url) = next {
        let response = get(http, &url, token, fetcher).await?;
        let page: PlaylistTracksResponse = response.json()?;

        for item in page.items {
            match item.track {
                Some(track) => match (track.id, track.name) {
                    (Some(id), Some(name)) if !id.is_empty() => tracks.push(Track { id, name }),
                    _ => skipped += 1,
                },
                None => skipped += 1,
            }
        }
        next = page.next;
    }

    if skipped > 0 {
        warning!("Skipped {} playlist entries without a track id.", skipped);
    }

    Ok(tracks)
}
