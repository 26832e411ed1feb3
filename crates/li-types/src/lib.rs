//! Shared types, error types, and wire payloads for the LiLogin handshake

pub mod callback;
pub mod codes;
pub mod errors;

pub use callback::{AuthFailure, CallbackResult, StoredResult};
pub use errors::{FlowError, FlowResult};
