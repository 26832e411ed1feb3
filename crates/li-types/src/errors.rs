//! Error types and conversions

use thiserror::Error;

use crate::callback::AuthFailure;
use crate::codes;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Popup was blocked by the browser")]
    PopupBlocked,

    #[error("Transport not supported: {0}")]
    NotSupported(String),

    #[error("Failed to parse callback URL: {0}")]
    UrlParse(String),

    #[error("Callback processing error: {0}")]
    CallbackProcessing(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type FlowResult<T> = Result<T, FlowError>;

impl FlowError {
    /// Convert into the wire-shaped failure delivered to the error callback.
    ///
    /// Every variant maps onto the protocol error taxonomy so no internal
    /// error ever escapes to the host application uncaught.
    pub fn into_failure(self) -> AuthFailure {
        match self {
            FlowError::Configuration(msg) => {
                AuthFailure::new(codes::ERR_CONFIGURATION_ERROR, msg)
            }
            FlowError::Storage(msg) => AuthFailure::new(codes::ERR_STORAGE_ERROR, msg),
            FlowError::PopupBlocked => AuthFailure::new(
                codes::ERR_POPUP_BLOCKED,
                codes::MSG_POPUP_BLOCKED.to_string(),
            ),
            FlowError::NotSupported(msg) => AuthFailure::new(codes::ERR_NOT_SUPPORTED, msg),
            FlowError::UrlParse(msg) => AuthFailure::new(codes::ERR_URL_PARSE_ERROR, msg),
            FlowError::CallbackProcessing(msg) => {
                AuthFailure::new(codes::ERR_CALLBACK_PROCESSING_ERROR, msg)
            }
            FlowError::Transport(msg) => AuthFailure::new(codes::ERR_OAUTH_ERROR, msg),
            FlowError::Serialization(e) => {
                AuthFailure::new(codes::ERR_CALLBACK_PROCESSING_ERROR, e.to_string())
            }
        }
    }
}
