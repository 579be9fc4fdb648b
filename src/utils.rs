use rand::{Rng, distr::Alphanumeric};

use crate::analysis::FEATURE_COLUMNS;

/// Random value for the OAuth `state` parameter.
pub fn generate_state() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Shows at most the first four characters of a secret value.
pub fn truncate_secret(value: &str) -> String {
    let visible: String = value.chars().take(4).collect();
    if value.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{visible}****")
    }
}

/// Feature columns requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnList(pub Vec<String>);

/// Clap value parser for a comma separated list of feature columns.
///
/// Names are checked against the known audio feature columns so typos are
/// rejected at the command line instead of failing the correlation later.
pub fn parse_columns(s: &str) -> Result<ColumnList, String> {
    let mut columns = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let name = part.to_ascii_lowercase();
        if !FEATURE_COLUMNS.contains(&name.as_str()) {
            return Err(format!(
                "unknown column '{part}', expected one of: {}",
                FEATURE_COLUMNS.join(", ")
            ));
        }
        if !columns.contains(&name) {
            columns.push(name);
        }
    }

    if columns.is_empty() {
        return Err("at least one column is required".to_string());
    }

    Ok(ColumnList(columns))
}

/// Accepts a bare playlist id, a `spotify:playlist:<id>` uri or an
/// `open.spotify.com/playlist/<id>` link.
pub fn playlist_id_from(input: &str) -> Option<String> {
    let input = input.trim();
    let candidate = if let Some(rest) = input.strip_prefix("spotify:playlist:") {
        rest
    } else if let Some((_, rest)) = input.split_once("/playlist/") {
        rest.split(['?', '/', '#']).next().unwrap_or_default()
    } else {
        input
    };

    if !candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(candidate.to_string())
    } else {
        None
    }
}

/// Formats an optional feature value for table output.
pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_nan() => "NaN".to_string(),
        Some(v) => format!("{v:.3}"),
        None => "-".to_string(),
    }
}
