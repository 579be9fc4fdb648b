use async_trait::async_trait;
use reqwest::Client;

use crate::{
    Res,
    analysis::FeatureSource,
    error::AnalysisError,
    spotify::{fetch::RateLimitedFetcher, get},
    types::{AccessToken, AudioFeatureVector, AudioFeaturesResponse},
};

/// Largest id batch accepted by `/audio-features`.
pub const AUDIO_FEATURES_BATCH: usize = 100;

/// Fetches audio features for up to 100 ids in one call.
///
/// The provider answers with an array parallel to `ids`, holding `null` for
/// ids it has no features for.
pub async fn get_audio_features(
    http: &Client,
    api_url: &str,
    token: &AccessToken,
    fetcher: &mut RateLimitedFetcher,
    ids: &[String],
) -> Res<Vec<Option<AudioFeatureVector>>> {
    if ids.len() > AUDIO_FEATURES_BATCH {
        return Err(AnalysisError::Configuration(format!(
            "audio feature batch of {} exceeds the limit of {}",
            ids.len(),
            AUDIO_FEATURES_BATCH
        )));
    }

    let url = format!("{api_url}/audio-features?ids={}", ids.join(","));
    let response = get(http, &url, token, fetcher).await?;
    let json: AudioFeaturesResponse = response.json()?;
    Ok(json.audio_features)
}

/// [`FeatureSource`] backed by the Web API.
pub struct SpotifyFeatureSource<'a> {
    pub http: &'a Client,
    pub api_url: &'a str,
    pub token: &'a AccessToken,
    pub fetcher: &'a mut RateLimitedFetcher,
}

#[async_trait]
impl FeatureSource for SpotifyFeatureSource<'_> {
    fn batch_size(&self) -> usize {
        AUDIO_FEATURES_BATCH
    }

    async fn fetch_batch(
        &mut self,
        ids: &[String],
    ) -> Result<Vec<Option<AudioFeatureVector>>, AnalysisError> {
        get_audio_features(self.http, self.api_url, self.token, self.fetcher, ids).await
    }
}
