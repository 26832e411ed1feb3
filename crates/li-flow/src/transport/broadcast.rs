//! Broadcast-channel transport
//!
//! Used when opener references are unavailable: the callback context
//! broadcasts its result on a named channel instead of messaging its opener.
//! Each attempt carries a session id so unrelated concurrent logins sharing
//! the channel name do not cross-talk.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use li_types::{CallbackResult, FlowError, FlowResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::geometry::{PopupGeometry, ScreenSize};
use crate::host::{ContextOpener, Destination, HostEnvironment};
use crate::transport::{
    wait_for_close, MonitorContext, MonitorEvent, Transport, POPUP_CHECK_INTERVAL, POPUP_HEIGHT,
    POPUP_WIDTH,
};

/// Default channel name shared by opener and callback contexts.
pub const DEFAULT_CHANNEL: &str = "linkedin-oauth-channel";

const CHANNEL_CAPACITY: usize = 16;

/// Envelope broadcast by the callback context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastEnvelope {
    /// Correlation id; envelopes for other sessions are ignored.
    #[serde(rename = "sessionId")]
    pub session_id: String,

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
}

impl BroadcastEnvelope {
    pub fn from_callback(result: &CallbackResult, session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            code: result.code.clone(),
            error: result.error.clone(),
            error_message: result.error.as_ref().map(|_| result.error_message()),
            state: result.state.clone(),
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

/// Registry of named broadcast channels — the `BroadcastChannel` analog.
///
/// Hosts that support cross-context broadcast own one hub and hand it to both
/// the opener environment and the callback context. Environments without a
/// hub fail the broadcast transport with `not_supported`.
pub struct BroadcastHub {
    channels: Mutex<HashMap<String, broadcast::Sender<BroadcastEnvelope>>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create the named channel.
    pub fn channel(&self, name: &str) -> broadcast::Sender<BroadcastEnvelope> {
        self.channels
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

pub struct BroadcastTransport {
    opener: Arc<dyn ContextOpener>,
    hub: Option<Arc<BroadcastHub>>,
    channel_name: String,
    screen: ScreenSize,
}

impl BroadcastTransport {
    pub fn new(env: &HostEnvironment, channel: Option<String>) -> Self {
        Self {
            opener: Arc::clone(&env.opener),
            hub: env.broadcast.clone(),
            channel_name: channel.unwrap_or_else(|| DEFAULT_CHANNEL.to_string()),
            screen: env.screen,
        }
    }
}

#[async_trait]
impl Transport for BroadcastTransport {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    fn uses_session_id(&self) -> bool {
        true
    }

    fn open(&self, auth_url: &str) -> FlowResult<Destination> {
        if self.hub.is_none() {
            return Err(FlowError::NotSupported(
                "Broadcast channels are unavailable in this environment".to_string(),
            ));
        }
        let geometry = PopupGeometry::centered(self.screen, POPUP_WIDTH, POPUP_HEIGHT);
        self.opener.open(auth_url, Some(&geometry))
    }

    async fn monitor(&self, ctx: MonitorContext) -> MonitorEvent {
        // open() rejected the attempt if no hub exists.
        let Some(hub) = self.hub.as_ref() else {
            return MonitorEvent::Failed(
                FlowError::NotSupported(
                    "Broadcast channels are unavailable in this environment".to_string(),
                )
                .into_failure(),
            );
        };
        let mut rx = hub.channel(&self.channel_name).subscribe();
        let expected_session = ctx.session_id.clone().unwrap_or_default();

        let closed = wait_for_close(&ctx.destination, POPUP_CHECK_INTERVAL);
        tokio::pin!(closed);

        loop {
            tokio::select! {
                received = rx.recv() => {
                    match received {
                        Ok(envelope) => {
                            if envelope.session_id != expected_session {
                                debug!(
                                    "Ignoring broadcast for another session on channel {}",
                                    self.channel_name
                                );
                                continue;
                            }
                            return MonitorEvent::Result(envelope.into_callback());
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("Broadcast receiver lagged, skipped {} envelopes", skipped);
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            // The hub holds the sender; closure means the
                            // whole environment is being torn down.
                            futures::future::pending::<()>().await;
                        }
                    }
                }
                () = &mut closed => {
                    debug!("Popup closed before a broadcast arrived: {}", ctx.attempt_id);
                    return MonitorEvent::DestinationClosed;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_returns_same_channel_for_name() {
        let hub = BroadcastHub::new();
        let a = hub.channel("login");
        let b = hub.channel("login");
        assert!(a.same_channel(&b));

        let other = hub.channel("other");
        assert!(!a.same_channel(&other));
    }

    #[test]
    fn test_envelope_round_trip() {
        let result = CallbackResult::success("AQT", "state");
        let envelope = BroadcastEnvelope::from_callback(&result, "session42");
        assert_eq!(envelope.session_id, "session42");
        assert_eq!(envelope.into_callback(), result);
    }

    #[test]
    fn test_envelope_wire_format() {
        let envelope =
            BroadcastEnvelope::from_callback(&CallbackResult::success("c", "s"), "sid");
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"sessionId\":\"sid\""));
    }

    #[tokio::test]
    async fn test_channel_delivers_to_subscriber() {
        let hub = BroadcastHub::new();
        let tx = hub.channel("login");
        let mut rx = tx.subscribe();

        let envelope =
            BroadcastEnvelope::from_callback(&CallbackResult::success("c", "s"), "sid");
        tx.send(envelope).unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.session_id, "sid");
    }
}
