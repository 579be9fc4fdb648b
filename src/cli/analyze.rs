use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use tabled::{Table, builder::Builder};

use crate::{
    analysis::{
        AnalysisReport, CorrelationMatrix, DEFAULT_CORRELATION_COLUMNS, FeatureTable, TrackSource,
        run_analysis,
    },
    config, error,
    error::AnalysisError,
    info,
    session::Session,
    spotify::{
        auth::{self, TokenExchanger},
        fetch::{CancelSignal, RateLimitedFetcher, RetryPolicy},
        tracks::TimeRange,
    },
    success,
    types::FeatureTableRow,
    utils, warning,
};

pub async fn analyze(
    playlist: Option<String>,
    limit: u32,
    time_range: TimeRange,
    columns: Option<Vec<String>>,
) {
    let credentials = match config::credentials() {
        Ok(c) => c,
        Err(e) => error!("{}", e),
    };
    let endpoints = config::Endpoints::from_env();
    let http = Client::new();

    let source = match playlist {
        Some(p) => match utils::playlist_id_from(&p) {
            Some(id) => TrackSource::Playlist(id),
            None => error!("'{}' is not a playlist id or link", p),
        },
        None => TrackSource::TopTracks { limit, time_range },
    };

    let token = match &source {
        TrackSource::Playlist(_) => {
            TokenExchanger::new(http.clone(), endpoints.token_url.clone())
                .exchange_client_credentials(&credentials)
                .await
        }
        TrackSource::TopTracks { .. } => {
            auth::login(&http, &credentials, &endpoints, &config::spotify_scope()).await
        }
    };

    let mut session = Session::new();
    match token {
        Ok(t) => session.authenticate(t),
        Err(e) => error!("Authentication error: {}", e),
    }

    let (handle, signal) = CancelSignal::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });
    let mut fetcher = RateLimitedFetcher::new(RetryPolicy::default()).with_cancel(signal);

    let columns = columns.unwrap_or_else(|| {
        DEFAULT_CORRELATION_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .collect()
    });

    let pb = ProgressBar::new_spinner();
    pb.set_message(match &source {
        TrackSource::Playlist(id) => format!("Fetching tracks of playlist {id}..."),
        TrackSource::TopTracks { .. } => "Fetching your top tracks...".to_string(),
    });
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }

    let report = run_analysis(
        &mut session,
        &http,
        &endpoints.api_url,
        &mut fetcher,
        &source,
        &columns,
    )
    .await;
    pb.finish_and_clear();

    match report {
        Ok(report) => print_report(&report),
        Err(AnalysisError::Cancelled) => warning!("Analysis cancelled."),
        Err(e) => error!("An error occurred while processing Spotify data: {}", e),
    }
}

fn print_report(report: &AnalysisReport) {
    success!("Successfully fetched {} tracks", report.tracks.len());
    if report.dropped > 0 {
        info!(
            "{} tracks had no audio features and are not part of the analysis.",
            report.dropped
        );
    }

    println!("Audio features\n{}\n", Table::new(feature_rows(&report.table)));
    println!(
        "Correlation of audio features\n{}\n",
        correlation_table(&report.correlation)
    );
}

pub fn feature_rows(table: &FeatureTable) -> Vec<FeatureTableRow> {
    (0..table.len())
        .map(|row| {
            let cell = |column: &str| utils::format_value(table.value(row, column));
            FeatureTableRow {
                track: table.rows()[row].name.clone(),
                danceability: cell("danceability"),
                energy: cell("energy"),
                loudness: cell("loudness"),
                speechiness: cell("speechiness"),
                acousticness: cell("acousticness"),
                instrumentalness: cell("instrumentalness"),
                liveness: cell("liveness"),
                valence: cell("valence"),
                tempo: cell("tempo"),
                key: cell("key"),
                mode: cell("mode"),
                time_signature: cell("time_signature"),
                duration_ms: cell("duration_ms"),
            }
        })
        .collect()
}

pub fn correlation_table(matrix: &CorrelationMatrix) -> Table {
    let mut builder = Builder::default();

    let mut header = vec![String::new()];
    header.extend(matrix.columns().iter().cloned());
    builder.push_record(header);

    for (name, values) in matrix.columns().iter().zip(matrix.values()) {
        let mut record = vec![name.clone()];
        record.extend(values.iter().map(|v| utils::format_value(Some(*v))));
        builder.push_record(record);
    }

    builder.build()
}
