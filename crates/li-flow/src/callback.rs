//! Callback-context handler
//!
//! Runs in the second browsing context after the identity provider redirects
//! back: parses the returned URL, validates the persisted CSRF state, and
//! relays the result to the opener over whichever relay channel is active.
//! The returned render state is the minimal status surface the host displays
//! (processing / success / error) — no further API is exposed.

use std::sync::Arc;

use li_store::{keys, KeyValueStore};
use li_types::{codes, CallbackResult, FlowError, FlowResult, StoredResult};
use tracing::{debug, error, info, warn};

use crate::transport::broadcast::{BroadcastEnvelope, BroadcastHub};
use crate::transport::opener::{MessageSender, RelayMessage, RelayPayload};
use crate::url::parse_callback_result;

/// Relay channel back to the opener context.
pub enum Relay {
    /// Post to the opener over the cross-window message bus.
    Opener {
        sender: MessageSender,
        /// Origin stamped on outgoing messages — the callback page's own
        /// origin, which the opener side verifies.
        origin: String,
    },

    /// Broadcast on a named channel, correlated by the persisted session id.
    Broadcast {
        hub: Arc<BroadcastHub>,
        channel: String,
    },

    /// Write the serialized result to the shared persistent store.
    Storage,
}

/// What the callback page should display, and whether it may close itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRender {
    pub message: String,
    pub is_error: bool,
    /// The host closes the window (after a short delay on success,
    /// immediately on user-cancelled logins).
    pub close_window: bool,
}

impl CallbackRender {
    fn success() -> Self {
        Self {
            message: "Login successful. You can close this window.".to_string(),
            is_error: false,
            close_window: true,
        }
    }

    fn error(message: impl Into<String>, close_window: bool) -> Self {
        Self {
            message: message.into(),
            is_error: true,
            close_window,
        }
    }
}

pub struct CallbackContext {
    store: Arc<dyn KeyValueStore>,
    relay: Relay,
}

impl CallbackContext {
    pub fn new(store: Arc<dyn KeyValueStore>, relay: Relay) -> Self {
        Self { store, relay }
    }

    /// Parse, validate, and relay the redirect delivered to this context.
    pub fn process(&self, url: &str) -> CallbackRender {
        let result = match parse_callback_result(url) {
            Ok(result) => result,
            Err(e) => {
                error!("Failed to parse callback URL: {}", e);
                return CallbackRender::error(codes::MSG_URL_PARSE_ERROR, false);
            }
        };
        debug!(
            "Parsed callback: code={}, error={:?}",
            result.code.is_some(),
            result.error
        );

        // CSRF check. On mismatch nothing is relayed: this context cannot
        // tell an attacker from a stale tab, and the opener resolves through
        // its own timeout or the user closing the window.
        let saved_state = self.store.get(keys::STATE_KEY);
        if saved_state.as_deref() != Some(result.state.as_str()) {
            error!("State does not match");
            return CallbackRender::error("State does not match", false);
        }

        if let Err(e) = self.relay_result(&result) {
            error!("Failed to relay callback result: {}", e);
            return CallbackRender::error(e.into_failure().error_message, false);
        }

        if let Some(provider_error) = &result.error {
            info!("Relayed provider error: {}", provider_error);
            // A user-dismissed consent screen closes its window immediately.
            let close = provider_error == codes::PROVIDER_USER_CANCELLED;
            return CallbackRender::error(result.error_message(), close);
        }
        if result.code.is_some() {
            info!("Relayed authorization code");
            return CallbackRender::success();
        }

        // Neither code nor error: relayed as-is so the opener reports
        // no_code; render the same condition here.
        warn!("Callback carried neither code nor error");
        CallbackRender::error(codes::MSG_NO_CODE, false)
    }

    fn relay_result(&self, result: &CallbackResult) -> FlowResult<()> {
        match &self.relay {
            Relay::Opener { sender, origin } => {
                let delivered = sender.send(RelayMessage {
                    origin: origin.clone(),
                    payload: RelayPayload::from_callback(result),
                });
                if !delivered {
                    return Err(FlowError::CallbackProcessing(
                        "No opener context is listening".to_string(),
                    ));
                }
                Ok(())
            }
            Relay::Broadcast { hub, channel } => {
                let session_id = self
                    .store
                    .get(keys::SESSION_ID_KEY)
                    .unwrap_or_default();
                // A send error only means no subscriber is currently
                // listening; the opener may pick the attempt up through its
                // timeout instead.
                let _ = hub
                    .channel(channel)
                    .send(BroadcastEnvelope::from_callback(result, session_id));
                Ok(())
            }
            Relay::Storage => {
                let stored = StoredResult::from_callback(result);
                let json = serde_json::to_string(&stored)?;
                if !self.store.set(keys::RESULT_KEY, &json) {
                    return Err(FlowError::Storage(
                        "Failed to persist authentication result".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}
