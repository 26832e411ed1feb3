//! OAuth 2.0 authorization-code handshake for host-embedded logins
//!
//! This crate drives the cross-context OAuth handshake: an opener context
//! starts a login attempt, the identity provider redirects a second browsing
//! context (popup window, same-window navigation, or embedded view) to a
//! callback page, and the terminal result travels back over one of four
//! interchangeable transports.
//!
//! # Features
//! - Per-attempt state machine with exactly-once terminal callbacks
//! - CSRF protection with a persisted state parameter
//! - Four result transports: opener messaging, broadcast channel,
//!   storage polling, and backend polling
//! - Timeout, user-cancel, and host-teardown handling
//!
//! # Usage Example
//! ```ignore
//! use std::sync::Arc;
//! use li_flow::{FlowConfig, LoginFlow};
//!
//! let config = FlowConfig::new("my-client-id", "https://app.example/callback");
//! let flow = LoginFlow::configure(
//!     config,
//!     &env, // HostEnvironment supplied by the embedding application
//!     Arc::new(|code| println!("authorization code: {code}")),
//!     Arc::new(|failure| eprintln!("login failed: {}", failure.error_message)),
//! );
//! flow.login();
//! ```

mod attempt;
pub mod callback;
pub mod geometry;
pub mod host;
pub mod ident;
mod manager;
pub mod transport;
pub mod url;

pub use attempt::{AttemptId, FlowOutcome, FlowStatus};
pub use callback::{CallbackContext, CallbackRender, Relay};
pub use host::{ContextOpener, Destination, DestinationHandle, HostEnvironment};
pub use manager::{ErrorCallback, FlowConfig, LoginFlow, SuccessCallback};
pub use transport::broadcast::{BroadcastEnvelope, BroadcastHub};
pub use transport::opener::{MessageBus, MessageSender, RelayMessage, RelayPayload};
pub use transport::{Transport, TransportOptions};
