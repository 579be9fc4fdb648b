use std::collections::{HashMap, HashSet};

use crate::{
    error::AnalysisError,
    types::{AudioFeatureVector, Track},
    warning,
};

use super::{FeatureSource, FeatureTable};

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledTable {
    pub table: FeatureTable,
    /// Tracks without a feature vector, left out of the table.
    pub dropped: usize,
}

/// Builds the feature table for `tracks`.
///
/// Ids are fetched in batches of `source.batch_size()`. Tracks the provider has
/// no features for are dropped rather than filled with defaults; the surviving
/// rows keep the input order.
pub async fn assemble<S>(tracks: &[Track], source: &mut S) -> Result<AssembledTable, AnalysisError>
where
    S: FeatureSource + ?Sized,
{
    if tracks.is_empty() {
        return Err(AnalysisError::EmptyResult);
    }

    let batch_size = source.batch_size().max(1);
    let mut table = FeatureTable::audio_features();
    let mut dropped = 0;

    for (batch, chunk) in tracks.chunks(batch_size).enumerate() {
        let ids: Vec<String> = chunk.iter().map(|t| t.id.clone()).collect();

        let entries = match source.fetch_batch(&ids).await {
            Ok(entries) => entries,
            Err(AnalysisError::Cancelled) => return Err(AnalysisError::Cancelled),
            Err(e) => {
                return Err(AnalysisError::FeatureFetch {
                    batch,
                    source: Box::new(e),
                });
            }
        };

        for (track, features) in chunk.iter().zip(align(&ids, entries)) {
            match features {
                Some(features) => table.push_features(track, &features)?,
                None => dropped += 1,
            }
        }
    }

    if dropped > 0 {
        warning!(
            "Dropped {} of {} tracks without audio features.",
            dropped,
            tracks.len()
        );
    }

    Ok(AssembledTable { table, dropped })
}

/// Matches provider entries to the requested ids.
///
/// Entries carrying a requested id are matched by that id, so a short or
/// reordered answer cannot shift features onto the wrong track. When the answer
/// is exactly parallel to the request, an entry whose id matches none of the
/// requested ids (missing, or a relinked track) belongs to the id at its
/// position.
fn align(
    ids: &[String],
    entries: Vec<Option<AudioFeatureVector>>,
) -> Vec<Option<AudioFeatureVector>> {
    let parallel = entries.len() == ids.len();
    if !parallel {
        warning!(
            "Requested features for {} tracks but received {} entries.",
            ids.len(),
            entries.len()
        );
    }

    let requested: HashSet<&str> = ids.iter().map(String::as_str).collect();
    let mut by_id: HashMap<String, AudioFeatureVector> = HashMap::new();
    let mut positional: Vec<Option<AudioFeatureVector>> = vec![None; ids.len()];

    for (idx, entry) in entries.into_iter().enumerate() {
        let Some(features) = entry else { continue };
        if requested.contains(features.track_id.as_str()) {
            by_id.entry(features.track_id.clone()).or_insert(features);
        } else if parallel {
            positional[idx] = Some(features);
        }
    }

    let mut aligned = Vec::with_capacity(ids.len());
    for (idx, id) in ids.iter().enumerate() {
        let found = by_id.get(id).cloned().or_else(|| {
            positional[idx].take().map(|mut f| {
                f.track_id = id.clone();
                f
            })
        });
        aligned.push(found);
    }
    aligned
}
