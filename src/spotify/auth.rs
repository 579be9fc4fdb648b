use std::{sync::Arc, time::Duration};

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::Utc;
use reqwest::{Client, header::AUTHORIZATION};
use tokio::{
    sync::Mutex,
    time::{Instant, sleep},
};
use url::Url;

use crate::{
    api::CallbackOutcome,
    config::{self, Endpoints},
    error::AnalysisError,
    server::{bind_callback_listener, start_api_server},
    spotify::fetch::{RawResponse, RetryPolicy, TransportError},
    success,
    types::{AccessToken, AuthorizationGrant, Credentials, TokenErrorResponse, TokenResponse},
    utils, warning,
};

/// Builds the provider login URL.
///
/// The redirect URI is passed through verbatim and percent-encoded exactly once
/// by the query serializer, so decoding the parameter yields the configured
/// string. `show_dialog=true` forces the consent screen even when the user
/// already approved the application.
///
/// # Arguments
///
/// * `auth_endpoint` - Authorization endpoint, e.g. `https://accounts.spotify.com/authorize`
/// * `credentials` - Supplies the client id and the redirect URI
/// * `scope` - Space separated scopes, `user-top-read` for top tracks
/// * `state` - Opaque value echoed back on the redirect
///
/// # Returns
///
/// The complete URL with `client_id`, `response_type=code`, `redirect_uri`,
/// `scope`, `state` and `show_dialog` query parameters.
///
/// # Errors
///
/// [`AnalysisError::Configuration`] when `auth_endpoint` is not a valid URL.
pub fn authorize_url(
    auth_endpoint: &str,
    credentials: &Credentials,
    scope: &str,
    state: &str,
) -> Result<Url, AnalysisError> {
    let mut url = Url::parse(auth_endpoint).map_err(|e| {
        AnalysisError::Configuration(format!("authorization endpoint '{auth_endpoint}': {e}"))
    })?;

    url.query_pairs_mut()
        .append_pair("client_id", credentials.client_id())
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", credentials.redirect_uri())
        .append_pair("scope", scope)
        .append_pair("state", state)
        .append_pair("show_dialog", "true");

    Ok(url)
}

/// `Basic base64(client_id:client_secret)`.
pub fn basic_auth_header(credentials: &Credentials) -> String {
    let pair = format!("{}:{}", credentials.client_id(), credentials.client_secret());
    format!("Basic {}", STANDARD.encode(pair.as_bytes()))
}

/// Exchanges grants and client credentials for access tokens.
pub struct TokenExchanger {
    http: Client,
    token_url: String,
    policy: RetryPolicy,
}

impl TokenExchanger {
    pub fn new(http: Client, token_url: impl Into<String>) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Trades an authorization code for an access token.
    ///
    /// The grant is consumed. A code is single use on the provider side, so a
    /// refused exchange is returned as [`AnalysisError::AuthExchange`] and never
    /// retried: the user has to go through the login again.
    ///
    /// # Arguments
    ///
    /// * `grant` - The code received on the redirect
    /// * `credentials` - Signs the request (`Authorization: Basic`) and supplies
    ///   the redirect URI, which must be the string used for the login URL
    ///
    /// # Returns
    ///
    /// The access token with its lifetime, stamped with the current time.
    ///
    /// # Errors
    ///
    /// - [`AnalysisError::AuthExchange`] - the endpoint answered with a non-2xx
    ///   status, or a 2xx payload without a usable `access_token`
    /// - [`AnalysisError::Network`] - the request did not reach the endpoint
    pub async fn exchange(
        &self,
        grant: AuthorizationGrant,
        credentials: &Credentials,
    ) -> Result<AccessToken, AnalysisError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", grant.code.as_str()),
            ("redirect_uri", credentials.redirect_uri()),
        ];

        let response = self
            .post_form(credentials, &form)
            .await
            .map_err(|TransportError(e)| AnalysisError::Network(e))?;

        parse_token_response(&response)
    }

    /// Client credentials flow for public data (e.g. public playlists).
    ///
    /// Only connection failures are retried; a refusal from the token endpoint
    /// is final.
    ///
    /// # Errors
    ///
    /// - [`AnalysisError::AuthExchange`] - refused or malformed answer
    /// - [`AnalysisError::Api`] with `exhausted` set - every attempt failed to
    ///   connect
    pub async fn exchange_client_credentials(
        &self,
        credentials: &Credentials,
    ) -> Result<AccessToken, AnalysisError> {
        let form = [("grant_type", "client_credentials")];
        let max_attempts = self.policy.max_retries.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.post_form(credentials, &form).await {
                Ok(response) => return parse_token_response(&response),
                Err(TransportError(e)) if attempt < max_attempts => {
                    warning!(
                        "Token request failed ({}), retrying in {}s ({}/{})",
                        e,
                        self.policy.transient_delay.as_secs(),
                        attempt,
                        max_attempts
                    );
                    sleep(self.policy.transient_delay).await;
                }
                Err(TransportError(e)) => {
                    return Err(AnalysisError::Api {
                        status: None,
                        message: e,
                        exhausted: true,
                    });
                }
            }
        }
    }

    async fn post_form(
        &self,
        credentials: &Credentials,
        form: &[(&str, &str)],
    ) -> Result<RawResponse, TransportError> {
        let response = self
            .http
            .post(&self.token_url)
            .header(AUTHORIZATION, basic_auth_header(credentials))
            .form(form)
            .send()
            .await?;

        RawResponse::from_response(response).await
    }
}

fn parse_token_response(response: &RawResponse) -> Result<AccessToken, AnalysisError> {
    let status_code = response.status.as_u16();

    if !response.status.is_success() {
        let provider_message = match serde_json::from_str::<TokenErrorResponse>(&response.body) {
            Ok(err) => match err.error_description {
                Some(description) => format!("{}: {}", err.error, description),
                None => err.error,
            },
            Err(_) => response.message(),
        };
        return Err(AnalysisError::AuthExchange {
            status_code,
            provider_message,
        });
    }

    let token: TokenResponse =
        serde_json::from_str(&response.body).map_err(|e| AnalysisError::AuthExchange {
            status_code,
            provider_message: format!("malformed token payload: {e}"),
        })?;

    if token.access_token.is_empty() {
        return Err(AnalysisError::AuthExchange {
            status_code,
            provider_message: "token payload carries an empty access_token".to_string(),
        });
    }

    Ok(AccessToken {
        value: token.access_token,
        obtained_at: Utc::now().timestamp() as u64,
        expires_in: token.expires_in,
    })
}

/// Runs the interactive authorization code flow.
///
/// 1. Starts the local callback server.
/// 2. Opens the authorization URL in the default browser.
/// 3. Waits up to 60 seconds for the provider redirect.
/// 4. Exchanges the received code for an access token.
///
/// # Errors
///
/// - [`AnalysisError::Configuration`] - the callback address cannot be derived
///   or bound
/// - [`AnalysisError::AuthorizationDenied`] - see [`grant_from`]
/// - anything [`TokenExchanger::exchange`] returns
pub async fn login(
    http: &Client,
    credentials: &Credentials,
    endpoints: &Endpoints,
    scope: &str,
) -> Result<AccessToken, AnalysisError> {
    let state = utils::generate_state();
    let auth_url = authorize_url(&endpoints.auth_url, credentials, scope, &state)?;

    let addr = config::server_addr(credentials)?;
    let path = config::callback_path(credentials)?;
    let shared_state: Arc<Mutex<Option<CallbackOutcome>>> = Arc::new(Mutex::new(None));

    let listener = bind_callback_listener(addr).await?;
    let server_state = Arc::clone(&shared_state);
    let server = tokio::spawn(async move { start_api_server(listener, &path, server_state).await });

    if webbrowser::open(auth_url.as_str()).is_err() {
        warning!(
            "Failed to open browser. Please navigate to the following URL manually:\n{}",
            auth_url
        );
    }

    let outcome = wait_for_callback(Arc::clone(&shared_state), Duration::from_secs(60)).await;
    server.abort();

    let grant = grant_from(outcome, &state)?;

    let token = TokenExchanger::new(http.clone(), endpoints.token_url.clone())
        .exchange(grant, credentials)
        .await?;
    success!("Authentication successful!");
    Ok(token)
}

/// Turns what the callback server received into a grant for the exchange.
///
/// # Arguments
///
/// * `outcome` - The recorded redirect, `None` when nothing arrived in time
/// * `expected_state` - The `state` sent with the authorization URL
///
/// # Errors
///
/// Returns [`AnalysisError::AuthorizationDenied`] when:
/// - the provider redirected with an `error` (the user declined, bad scope, ..)
/// - the returned `state` differs from `expected_state`
/// - no redirect arrived before the timeout
pub fn grant_from(
    outcome: Option<CallbackOutcome>,
    expected_state: &str,
) -> Result<AuthorizationGrant, AnalysisError> {
    match outcome {
        Some(CallbackOutcome::Code { code, state }) => {
            if state.as_deref() != Some(expected_state) {
                return Err(AnalysisError::AuthorizationDenied {
                    error: "state_mismatch".to_string(),
                    description: Some("callback state does not match the request".to_string()),
                });
            }
            Ok(AuthorizationGrant::new(code))
        }
        Some(CallbackOutcome::Denied { error, description }) => {
            Err(AnalysisError::AuthorizationDenied { error, description })
        }
        None => Err(AnalysisError::AuthorizationDenied {
            error: "timeout".to_string(),
            description: Some("no callback received within 60 seconds".to_string()),
        }),
    }
}

/// Polls the callback slot once per second until the redirect arrived or the
/// timeout elapsed.
pub async fn wait_for_callback(
    shared_state: Arc<Mutex<Option<CallbackOutcome>>>,
    max_wait: Duration,
) -> Option<CallbackOutcome> {
    let start = Instant::now();

    while start.elapsed() < max_wait {
        if let Some(outcome) = shared_state.lock().await.take() {
            return Some(outcome);
        }
        sleep(Duration::from_secs(1)).await;
    }

    None
}
