use crate::{
    error::AnalysisError,
    types::{AudioFeatureVector, Track},
};

use super::FEATURE_COLUMNS;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    /// Row key. Several rows may share a name.
    pub name: String,
    pub track_id: String,
    pub values: Vec<Option<f64>>,
}

/// Rectangular feature data, one row per track, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Empty table with every numeric audio feature column.
    pub fn audio_features() -> Self {
        Self::new(FEATURE_COLUMNS.iter().copied())
    }

    pub fn push(
        &mut self,
        name: impl Into<String>,
        track_id: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Result<(), AnalysisError> {
        if values.len() != self.columns.len() {
            return Err(AnalysisError::Decode(format!(
                "row has {} values but the table has {} columns",
                values.len(),
                self.columns.len()
            )));
        }

        self.rows.push(FeatureRow {
            name: name.into(),
            track_id: track_id.into(),
            values,
        });
        Ok(())
    }

    /// Appends a track's features. Only valid on an [`FeatureTable::audio_features`] table.
    pub fn push_features(
        &mut self,
        track: &Track,
        features: &AudioFeatureVector,
    ) -> Result<(), AnalysisError> {
        self.push(track.name.clone(), track.id.clone(), features.values())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.name.as_str())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Result<Vec<Option<f64>>, AnalysisError> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| AnalysisError::ColumnMissing {
                column: name.to_string(),
            })?;
        Ok(self.rows.iter().map(|r| r.values[idx]).collect())
    }

    pub fn value(&self, row: usize, column: &str) -> Option<f64> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.values[idx])
    }

    /// Projects the table onto `columns`, in the given order.
    pub fn select<S: AsRef<str>>(&self, columns: &[S]) -> Result<FeatureTable, AnalysisError> {
        let indices = columns
            .iter()
            .map(|c| {
                self.column_index(c.as_ref())
                    .ok_or_else(|| AnalysisError::ColumnMissing {
                        column: c.as_ref().to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FeatureTable {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| FeatureRow {
                    name: r.name.clone(),
                    track_id: r.track_id.clone(),
                    values: indices.iter().map(|&i| r.values[i]).collect(),
                })
                .collect(),
        })
    }
}
