use crate::error::AnalysisError;

use super::FeatureTable;

/// Pairwise Pearson coefficients, `values[i][j]` for `columns[i]` × `columns[j]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    columns: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Vec<f64>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        Some(self.values[i][j])
    }

    /// NaN entries are compared by identity so an undefined pair does not break symmetry.
    pub fn is_symmetric(&self) -> bool {
        (0..self.len()).all(|i| {
            (0..self.len()).all(|j| {
                let (a, b) = (self.values[i][j], self.values[j][i]);
                a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())
            })
        })
    }
}

/// Correlates the requested columns of `table`.
///
/// Every requested column must exist. Missing values are excluded pairwise, so a
/// null in one column only removes that row from the pairs involving it. Pairs
/// with fewer than two shared observations or without variance are NaN; the
/// diagonal is always 1.0.
pub fn correlate<S: AsRef<str>>(
    table: &FeatureTable,
    columns: &[S],
) -> Result<CorrelationMatrix, AnalysisError> {
    let data = columns
        .iter()
        .map(|c| table.column(c.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;

    let n = data.len();
    let mut values = vec![vec![f64::NAN; n]; n];

    for i in 0..n {
        values[i][i] = 1.0;
        for j in (i + 1)..n {
            let r = pearson(&data[i], &data[j]);
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    Ok(CorrelationMatrix {
        columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
        values,
    })
}

fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) if a.is_finite() && b.is_finite() => Some((*a, *b)),
            _ => None,
        })
        .collect();

    if pairs.len() < 2 {
        return f64::NAN;
    }

    let count = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(a, _)| a).sum::<f64>() / count;
    let mean_y = pairs.iter().map(|(_, b)| b).sum::<f64>() / count;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }

    (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0)
}
