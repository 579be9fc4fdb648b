use crate::{
    error::AnalysisError,
    types::AccessToken,
    warning,
};

/// Authentication state of one analysis run.
///
/// The token is the only mutable state shared between provider calls. It is
/// replaced wholesale on login and discarded by [`Session::settle`] when a call
/// downstream of authorization fails.
#[derive(Debug, Default)]
pub struct Session {
    token: Option<AccessToken>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: AccessToken) -> Self {
        Self { token: Some(token) }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.as_ref().is_some_and(|t| !t.is_expired())
    }

    pub fn authenticate(&mut self, token: AccessToken) {
        self.token = Some(token);
    }

    pub fn invalidate(&mut self) {
        self.token = None;
    }

    /// Returns the current token. An expired token is dropped and reported as
    /// [`AnalysisError::Unauthenticated`].
    pub fn token(&mut self) -> Result<&AccessToken, AnalysisError> {
        if self.token.as_ref().is_some_and(|t| t.is_expired()) {
            self.token = None;
        }
        self.token.as_ref().ok_or(AnalysisError::Unauthenticated)
    }

    /// Applies the reset policy to the outcome of a provider call.
    ///
    /// Any error except a cancellation sends the session back to the
    /// unauthenticated state so the next run starts with a fresh login.
    pub fn settle<T>(&mut self, result: Result<T, AnalysisError>) -> Result<T, AnalysisError> {
        if let Err(e) = &result {
            if e.resets_session() && self.token.is_some() {
                warning!("Discarding access token after failure: {}", e);
                self.token = None;
            }
        }
        result
    }
}
