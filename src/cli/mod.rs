//! # CLI Module
//!
//! User facing commands. Each command loads what it needs from
//! [`crate::config`], delegates the work to [`crate::spotify`] and
//! [`crate::analysis`], and presents the outcome as colored status lines and
//! tables.
//!
//! ```text
//! CLI Layer (User Interface)
//!     ↓
//! Analysis Layer (table assembly, correlation)
//!     ↓
//! Spotify Layer (auth, reads, retry policy)
//!     ↓
//! Network Layer (HTTP Requests)
//! ```
//!
//! ## Commands
//!
//! - [`login_url`] - prints the authorization URL for a manual login
//! - [`analyze`] - logs in, fetches tracks and features, prints the feature
//!   table and the correlation matrix
//!
//! ```bash
//! trackscope analyze                                  # long term top tracks
//! trackscope analyze --time-range short --limit 20
//! trackscope analyze --playlist 37i9dQZF1DXcBWIGoYBM5M
//! trackscope analyze --columns energy,valence,tempo
//! ```
//!
//! Errors are reported once, at this layer, with the `error!` macro which exits
//! the process.

mod analyze;
mod auth;

pub use analyze::analyze;
pub use analyze::correlation_table;
pub use analyze::feature_rows;
pub use auth::login_url;
