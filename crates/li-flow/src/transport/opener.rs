//! Opener-message transport — the default desktop popup flow
//!
//! The callback context posts its result to the opener over the host's
//! message bus (the cross-window `postMessage` analog). Messages are vetted
//! by origin and by the callback source tag; everything else is ignored and
//! listening continues. The popup is additionally polled for closure every
//! second so a user dismissing the window resolves the attempt.

use std::sync::Arc;

use async_trait::async_trait;
use li_types::{codes, CallbackResult, FlowResult};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::geometry::{PopupGeometry, ScreenSize};
use crate::host::{ContextOpener, Destination, HostEnvironment};
use crate::transport::{
    wait_for_close, MonitorContext, MonitorEvent, Transport, POPUP_CHECK_INTERVAL, POPUP_HEIGHT,
    POPUP_WIDTH,
};

/// Payload posted by the callback context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayPayload {
    /// Source tag; only payloads tagged with the callback marker are trusted.
    pub from: String,

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

impl RelayPayload {
    pub fn from_callback(result: &CallbackResult) -> Self {
        Self {
            from: codes::CALLBACK_SOURCE.to_string(),
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

/// One cross-window message: the payload plus the sender's origin.
#[derive(Debug, Clone)]
pub struct RelayMessage {
    pub origin: String,
    pub payload: RelayPayload,
}

/// Sending half of the message bus, handed to the callback context.
#[derive(Debug, Clone)]
pub struct MessageSender {
    tx: mpsc::UnboundedSender<RelayMessage>,
}

impl MessageSender {
    /// Post a message toward the opener. `false` when no opener context is
    /// listening anymore.
    pub fn send(&self, message: RelayMessage) -> bool {
        self.tx.send(message).is_ok()
    }
}

/// In-process analog of the cross-window messaging API.
///
/// The host owns one bus per opener context; the transport listens on it and
/// the callback context posts into it.
#[derive(Debug)]
pub struct MessageBus {
    tx: mpsc::UnboundedSender<RelayMessage>,
    rx: AsyncMutex<mpsc::UnboundedReceiver<RelayMessage>>,
}

impl MessageBus {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: AsyncMutex::new(rx),
        }
    }

    pub fn sender(&self) -> MessageSender {
        MessageSender {
            tx: self.tx.clone(),
        }
    }

    /// Receive the next message. Never resolves to nothing: the bus holds a
    /// sender for its own lifetime.
    async fn recv(&self) -> RelayMessage {
        let mut rx = self.rx.lock().await;
        loop {
            if let Some(message) = rx.recv().await {
                return message;
            }
        }
    }

    /// Discard any queued messages from a previous attempt.
    async fn drain(&self) {
        let mut rx = self.rx.lock().await;
        while rx.try_recv().is_ok() {}
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct OpenerTransport {
    opener: Arc<dyn ContextOpener>,
    bus: Arc<MessageBus>,
    origin: String,
    screen: ScreenSize,
}

impl OpenerTransport {
    pub fn new(env: &HostEnvironment) -> Self {
        Self {
            opener: Arc::clone(&env.opener),
            bus: Arc::clone(&env.message_bus),
            origin: env.origin.clone(),
            screen: env.screen,
        }
    }

    fn accepts(&self, message: &RelayMessage) -> bool {
        if message.origin != self.origin {
            warn!(
                "Ignoring message from unauthorized origin: {} (expected {})",
                message.origin, self.origin
            );
            return false;
        }
        if message.payload.from != codes::CALLBACK_SOURCE {
            debug!("Ignoring untagged message on the bus");
            return false;
        }
        true
    }
}

#[async_trait]
impl Transport for OpenerTransport {
    fn name(&self) -> &'static str {
        "opener"
    }

    fn open(&self, auth_url: &str) -> FlowResult<Destination> {
        let geometry = PopupGeometry::centered(self.screen, POPUP_WIDTH, POPUP_HEIGHT);
        debug!("Opening popup: {}", geometry);
        self.opener.open(auth_url, Some(&geometry))
    }

    async fn monitor(&self, ctx: MonitorContext) -> MonitorEvent {
        self.bus.drain().await;

        let closed = wait_for_close(&ctx.destination, POPUP_CHECK_INTERVAL);
        tokio::pin!(closed);

        loop {
            tokio::select! {
                message = self.bus.recv() => {
                    if !self.accepts(&message) {
                        continue;
                    }
                    debug!("Accepted relay message for attempt {}", ctx.attempt_id);
                    return MonitorEvent::Result(message.payload.into_callback());
                }
                () = &mut closed => {
                    debug!("Popup closed before a result arrived: {}", ctx.attempt_id);
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
    fn test_payload_round_trip() {
        let result = CallbackResult::success("AQT123", "state456");
        let payload = RelayPayload::from_callback(&result);
        assert_eq!(payload.from, codes::CALLBACK_SOURCE);
        assert!(payload.error_message.is_none());

        let back = payload.into_callback();
        assert_eq!(back, result);
    }

    #[test]
    fn test_error_payload_carries_message() {
        let result = CallbackResult::failure(
            "access_denied",
            Some("User denied access".to_string()),
            "state456",
        );
        let payload = RelayPayload::from_callback(&result);
        assert_eq!(payload.error_message.as_deref(), Some("User denied access"));
    }

    #[test]
    fn test_payload_wire_format() {
        let result = CallbackResult::failure("access_denied", None, "s");
        let payload = RelayPayload::from_callback(&result);
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"errorMessage\""));
        assert!(!json.contains("\"code\""));
    }

    #[tokio::test]
    async fn test_bus_delivers_in_order() {
        let bus = MessageBus::new();
        let sender = bus.sender();

        for state in ["first", "second"] {
            assert!(sender.send(RelayMessage {
                origin: "https://app.example".to_string(),
                payload: RelayPayload::from_callback(&CallbackResult::success("c", state)),
            }));
        }

        assert_eq!(bus.recv().await.payload.state, "first");
        assert_eq!(bus.recv().await.payload.state, "second");
    }

    #[tokio::test]
    async fn test_drain_discards_stale_messages() {
        let bus = MessageBus::new();
        let sender = bus.sender();
        sender.send(RelayMessage {
            origin: "https://app.example".to_string(),
            payload: RelayPayload::from_callback(&CallbackResult::success("c", "stale")),
        });

        bus.drain().await;

        sender.send(RelayMessage {
            origin: "https://app.example".to_string(),
            payload: RelayPayload::from_callback(&CallbackResult::success("c", "fresh")),
        });
        assert_eq!(bus.recv().await.payload.state, "fresh");
    }
}
