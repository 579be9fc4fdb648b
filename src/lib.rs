//! Spotify Track Analysis CLI Library
//!
//! Fetches a user's top tracks (or a playlist), retrieves their audio features and
//! summarizes them as a feature table plus a correlation matrix.
//!
//! # Modules
//!
//! - `analysis` - Feature table assembly and correlation
//! - `api` - HTTP endpoints for the local callback server
//! - `cli` - Command-line interface implementations
//! - `config` - Configuration management and environment variables
//! - `error` - Error taxonomy shared by every component
//! - `server` - Local HTTP server for OAuth callbacks
//! - `session` - Access token ownership and the reset policy
//! - `spotify` - Spotify Web API calls and the retry policy
//! - `types` - Data structures and type definitions
//! - `utils` - Utility functions and helpers

pub mod analysis;
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod server;
pub mod session;
pub mod spotify;
pub mod types;
pub mod utils;

/// Result alias used across the crate.
pub type Res<T> = std::result::Result<T, error::AnalysisError>;

/// Prints an informational message with a blue bullet point.
///
/// # Example
///
/// ```
/// info!("Fetching your top tracks...");
/// info!("Found {} tracks", count);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark and exits the program.
///
/// Only meant for the binary: library code returns
/// [`AnalysisError`](crate::error::AnalysisError) instead.
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a warning message with a yellow exclamation mark.
///
/// Used for recoverable issues such as dropped tracks or long rate limit waits.
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
