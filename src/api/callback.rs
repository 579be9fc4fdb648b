use std::{collections::HashMap, sync::Arc};

use axum::{Extension, extract::Query, response::Html};
use tokio::sync::Mutex;

/// What the provider sent back to the redirect URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Code {
        code: String,
        state: Option<String>,
    },
    Denied {
        error: String,
        description: Option<String>,
    },
}

impl CallbackOutcome {
    pub fn from_params(params: &HashMap<String, String>) -> Option<Self> {
        if let Some(error) = params.get("error") {
            return Some(CallbackOutcome::Denied {
                error: error.clone(),
                description: params.get("error_description").cloned(),
            });
        }

        params.get("code").map(|code| CallbackOutcome::Code {
            code: code.clone(),
            state: params.get("state").cloned(),
        })
    }
}

/// Records the redirect parameters for the waiting login flow. The code is not
/// exchanged here; the login flow owns the exchange.
pub async fn callback(
    Query(params): Query<HashMap<String, String>>,
    Extension(shared_state): Extension<Arc<Mutex<Option<CallbackOutcome>>>>,
) -> Html<&'static str> {
    let Some(outcome) = CallbackOutcome::from_params(&params) else {
        return Html("<h4>Missing authorization code.</h4>");
    };

    let page = match &outcome {
        CallbackOutcome::Code { .. } => {
            "<h2>Authorization received.</h2><p>Close this browser window and return to the terminal.</p>"
        }
        CallbackOutcome::Denied { .. } => "<h4>Login failed.</h4>",
    };

    *shared_state.lock().await = Some(outcome);
    Html(page)
}
