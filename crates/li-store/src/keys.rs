//! Storage keys — the observable persistent contract
//!
//! At most one attempt's state may live under these keys per origin; starting
//! a new attempt overwrites the prior record.

/// CSRF state of the current attempt.
pub const STATE_KEY: &str = "oauth2_state";

/// Correlation id used by the broadcast and polling transports.
pub const SESSION_ID_KEY: &str = "oauth2_session_id";

/// Serialized terminal result written by the storage transport's callback
/// side (consume-and-delete on pickup).
pub const RESULT_KEY: &str = "oauth2_mobile_result";
