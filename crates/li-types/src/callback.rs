//! Wire payloads exchanged between the opener and callback contexts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codes;

/// Parsed outcome delivered by the identity provider to the callback context.
///
/// In the well-formed case exactly one of `code`/`error` is populated; a
/// redirect carrying neither is classified as `no_code` by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackResult {
    /// Authorization code, present on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Provider error code, present on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Human-readable provider error description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,

    /// CSRF state round-tripped through the provider
    pub state: String,
}

impl CallbackResult {
    pub fn success(code: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            error: None,
            error_description: None,
            state: state.into(),
        }
    }

    pub fn failure(
        error: impl Into<String>,
        description: Option<String>,
        state: impl Into<String>,
    ) -> Self {
        Self {
            code: None,
            error: Some(error.into()),
            error_description: description,
            state: state.into(),
        }
    }

    /// Provider error message, falling back to the default when the provider
    /// sent no description.
    pub fn error_message(&self) -> String {
        self.error_description
            .clone()
            .unwrap_or_else(|| codes::MSG_OAUTH_ERROR.to_string())
    }
}

/// Terminal failure delivered to the error callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthFailure {
    /// Error code from the protocol taxonomy
    pub error: String,

    /// Human-readable message
    #[serde(rename = "errorMessage")]
    pub error_message: String,
}

impl AuthFailure {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            error_message: message.into(),
        }
    }

    pub fn state_mismatch() -> Self {
        Self::new(codes::ERR_STATE_MISMATCH, codes::MSG_STATE_MISMATCH)
    }

    pub fn no_code() -> Self {
        Self::new(codes::ERR_NO_CODE, codes::MSG_NO_CODE)
    }
}

/// Serialized terminal result persisted under `oauth2_mobile_result` by the
/// storage transport. Field names stay camelCase on the wire so stored
/// records are readable by non-Rust callback pages sharing the same origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(
        rename = "errorMessage",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub error_message: Option<String>,

    pub state: String,

    pub timestamp: DateTime<Utc>,
}

impl StoredResult {
    pub fn from_callback(result: &CallbackResult) -> Self {
        Self {
            code: result.code.clone(),
            error: result.error.clone(),
            error_message: result.error.as_ref().map(|_| result.error_message()),
            state: result.state.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn into_callback(self) -> CallbackResult {
        CallbackResult {
            code: self.code,
            error: self.error,
            error_description: self.error_message,
            state: self.state,
        }
    }
}
