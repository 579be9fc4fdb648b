//! HTTP endpoint of the local callback server.
//!
//! [`callback`] receives the provider redirect after login and hands the
//! authorization code (or the provider error) to the waiting login flow.

mod callback;

pub use callback::CallbackOutcome;
pub use callback::callback;
