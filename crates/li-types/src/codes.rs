//! Protocol error codes and default messages
//!
//! The string codes are the observable contract with embedding applications:
//! they arrive verbatim in the `error` field of the error callback.

/// Popup could not be opened (blocked by the host environment).
pub const ERR_POPUP_BLOCKED: &str = "popup_blocked";
/// The selected transport is unavailable in this environment.
pub const ERR_NOT_SUPPORTED: &str = "not_supported";
/// The user closed the destination window before a result arrived.
pub const ERR_USER_CLOSED_POPUP: &str = "user_closed_popup";
/// CSRF state validation failed.
pub const ERR_STATE_MISMATCH: &str = "state_mismatch";
/// Well-formed redirect carrying neither a code nor an error.
pub const ERR_NO_CODE: &str = "no_code";
/// Provider-reported OAuth error.
pub const ERR_OAUTH_ERROR: &str = "oauth_error";
/// Persistent storage unavailable or write failed.
pub const ERR_STORAGE_ERROR: &str = "storage_error";
/// Backend polling exceeded the maximum wait.
pub const ERR_TIMEOUT: &str = "timeout";
/// Storage polling exceeded the maximum wait.
pub const ERR_POLLING_TIMEOUT: &str = "polling_timeout";
/// Missing or invalid flow configuration.
pub const ERR_CONFIGURATION_ERROR: &str = "configuration_error";
/// Malformed callback URL.
pub const ERR_URL_PARSE_ERROR: &str = "url_parse_error";
/// Unexpected failure while processing the callback.
pub const ERR_CALLBACK_PROCESSING_ERROR: &str = "callback_processing_error";

pub const MSG_POPUP_BLOCKED: &str = "Popup was blocked by the browser";
pub const MSG_USER_CLOSED_POPUP: &str = "User closed the popup";
pub const MSG_STATE_MISMATCH: &str = "Authentication state validation failed";
pub const MSG_NO_CODE: &str = "No authorization code received";
pub const MSG_OAUTH_ERROR: &str = "Login failed. Please try again.";
pub const MSG_STORAGE_ERROR: &str = "Failed to save OAuth state";
pub const MSG_TIMEOUT: &str = "Authentication timed out";
pub const MSG_POLLING_TIMEOUT: &str = "Authentication polling timed out";
pub const MSG_URL_PARSE_ERROR: &str = "Failed to parse callback URL";

/// Tag marking relay payloads as coming from the identity callback context.
pub const CALLBACK_SOURCE: &str = "Linked In";

/// Provider error code meaning the user dismissed the consent screen.
pub const PROVIDER_USER_CANCELLED: &str = "user_cancelled_login";
