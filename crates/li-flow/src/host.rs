//! Host-environment abstraction
//!
//! Rust has no ambient `window`, so the embedding application supplies the
//! browsing-context primitives behind these traits: how to open a destination
//! context, how to tell whether it was closed, and which persistent store and
//! message media the two contexts share.

use std::sync::Arc;

use li_store::KeyValueStore;
use li_types::FlowResult;

use crate::geometry::{PopupGeometry, ScreenSize};
use crate::transport::broadcast::BroadcastHub;
use crate::transport::opener::MessageBus;

/// Handle to an opened destination context (popup window or child view).
///
/// Exclusively owned by the attempt that opened it; released on any terminal
/// transition.
pub trait DestinationHandle: Send + Sync {
    /// Whether the user (or host) has closed the context.
    fn is_closed(&self) -> bool;

    /// Close the context. Must be idempotent.
    fn close(&self);
}

/// An opened destination context.
#[derive(Clone)]
pub enum Destination {
    /// A separate window the attempt can observe and close.
    Window(Arc<dyn DestinationHandle>),

    /// Same-window or webview navigation: no handle exists, so the only
    /// terminal triggers are a relayed result or a timeout.
    Navigation,
}

impl Destination {
    pub fn handle(&self) -> Option<&Arc<dyn DestinationHandle>> {
        match self {
            Destination::Window(handle) => Some(handle),
            Destination::Navigation => None,
        }
    }
}

impl std::fmt::Debug for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::Window(handle) => f
                .debug_struct("Window")
                .field("closed", &handle.is_closed())
                .finish(),
            Destination::Navigation => write!(f, "Navigation"),
        }
    }
}

/// Opens destination contexts on behalf of the transports.
///
/// `geometry` is `Some` for popup-style opens and `None` when the transport
/// requests same-window navigation. A blocked popup must be reported as
/// `FlowError::PopupBlocked`, not as a panic or a dangling handle.
pub trait ContextOpener: Send + Sync {
    fn open(&self, url: &str, geometry: Option<&PopupGeometry>) -> FlowResult<Destination>;
}

/// Everything the handshake needs from the embedding application.
#[derive(Clone)]
pub struct HostEnvironment {
    /// Opens destination contexts.
    pub opener: Arc<dyn ContextOpener>,

    /// Per-origin persistent store shared by both contexts.
    pub store: Arc<dyn KeyValueStore>,

    /// Cross-window message medium (the `postMessage` analog). Relay
    /// messages whose origin differs from `origin` are ignored.
    pub message_bus: Arc<MessageBus>,

    /// Named broadcast channels, when the environment supports them.
    pub broadcast: Option<Arc<BroadcastHub>>,

    /// The host application's own origin, used to vet relay messages.
    pub origin: String,

    /// Screen dimensions for popup centering.
    pub screen: ScreenSize,
}

impl HostEnvironment {
    pub fn new(
        opener: Arc<dyn ContextOpener>,
        store: Arc<dyn KeyValueStore>,
        origin: impl Into<String>,
        screen: ScreenSize,
    ) -> Self {
        Self {
            opener,
            store,
            message_bus: Arc::new(MessageBus::new()),
            broadcast: None,
            origin: origin.into(),
            screen,
        }
    }

    /// Enable the broadcast-channel transport for this environment.
    pub fn with_broadcast(mut self, hub: Arc<BroadcastHub>) -> Self {
        self.broadcast = Some(hub);
        self
    }
}
