//! Result-relay transports
//!
//! The destination context cannot hand its result back directly, so each
//! transport implements the same contract over a different indirect channel:
//! opener messaging (default desktop popup), a named broadcast channel,
//! storage polling (embedded/mobile views), and backend polling (separate
//! OS-level browser processes).
//!
//! Transports deliver raw terminal candidates; CSRF state validation and the
//! exactly-once callback semantics live in one place, the orchestrator.

pub mod backend;
pub mod broadcast;
pub mod opener;
pub mod storage;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use li_types::{AuthFailure, CallbackResult, FlowResult};
use tokio::time::MissedTickBehavior;

use crate::attempt::AttemptId;
use crate::host::{Destination, HostEnvironment};

/// How often transports poll a destination window handle for closure.
pub const POPUP_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Default interval for the storage and backend polling transports.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default maximum wait before a polling transport gives up.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(300);

/// Default popup dimensions for the desktop transports.
pub const POPUP_WIDTH: u32 = 600;
pub const POPUP_HEIGHT: u32 = 600;

/// Popup dimensions used by the storage (mobile/webview) transport.
pub const MOBILE_POPUP_WIDTH: u32 = 500;
pub const MOBILE_POPUP_HEIGHT: u32 = 600;

/// Per-attempt context handed to `Transport::monitor`.
#[derive(Clone)]
pub struct MonitorContext {
    pub attempt_id: AttemptId,

    /// The CSRF state persisted for this attempt.
    pub state: String,

    /// Correlation id, present when the transport requested one.
    pub session_id: Option<String>,

    /// The opened destination context.
    pub destination: Destination,
}

/// First terminal candidate observed by a transport.
///
/// `Result` still needs state validation by the orchestrator; the other
/// variants are already classified.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// A relayed callback result (state not yet validated).
    Result(CallbackResult),

    /// The destination window was closed before any result arrived.
    DestinationClosed,

    /// The transport's maximum wait elapsed.
    TimedOut(AuthFailure),

    /// A transport-level failure classified into the error taxonomy.
    Failed(AuthFailure),
}

/// Uniform transport contract (strategy dispatch, one implementation per
/// relay channel).
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the transport needs a session correlation id distinct from
    /// the OAuth state.
    fn uses_session_id(&self) -> bool {
        false
    }

    /// The state value placed on the wire. Identity for all transports
    /// except backend polling, which appends the session id.
    fn wire_state(&self, state: &str, _session_id: Option<&str>) -> String {
        state.to_string()
    }

    /// Open the destination context with the authorization URL.
    fn open(&self, auth_url: &str) -> FlowResult<Destination>;

    /// Watch for the first terminal candidate. Must be cancel-safe: the
    /// orchestrator drops this future on teardown.
    async fn monitor(&self, ctx: MonitorContext) -> MonitorEvent;
}

/// Transport selection plus per-transport tunables.
#[derive(Debug, Clone)]
pub enum TransportOptions {
    /// Default desktop popup relaying over opener messaging.
    Opener,

    /// Named broadcast channel; `None` selects the default channel name.
    Broadcast { channel: Option<String> },

    /// Storage polling for embedded/mobile views.
    Storage {
        /// Navigate the current window instead of opening a popup.
        same_window: bool,
        poll_interval: Duration,
        max_wait: Duration,
    },

    /// Backend session-store polling.
    Backend {
        status_endpoint: String,
        poll_interval: Duration,
        max_wait: Duration,
    },
}

impl TransportOptions {
    pub fn storage() -> Self {
        TransportOptions::Storage {
            same_window: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }

    pub fn backend(status_endpoint: impl Into<String>) -> Self {
        TransportOptions::Backend {
            status_endpoint: status_endpoint.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }

    pub fn broadcast() -> Self {
        TransportOptions::Broadcast { channel: None }
    }
}

impl Default for TransportOptions {
    fn default() -> Self {
        TransportOptions::Opener
    }
}

/// Instantiate the configured transport against a host environment.
pub fn build_transport(
    options: &TransportOptions,
    env: &HostEnvironment,
) -> Arc<dyn Transport> {
    match options {
        TransportOptions::Opener => Arc::new(opener::OpenerTransport::new(env)),
        TransportOptions::Broadcast { channel } => {
            Arc::new(broadcast::BroadcastTransport::new(env, channel.clone()))
        }
        TransportOptions::Storage {
            same_window,
            poll_interval,
            max_wait,
        } => Arc::new(storage::StorageTransport::new(
            env,
            *same_window,
            *poll_interval,
            *max_wait,
        )),
        TransportOptions::Backend {
            status_endpoint,
            poll_interval,
            max_wait,
        } => Arc::new(backend::BackendTransport::new(
            env,
            status_endpoint.clone(),
            *poll_interval,
            *max_wait,
        )),
    }
}

/// Resolve when the destination window reports closed.
///
/// Polls `is_closed()` on the given cadence; never resolves for
/// `Destination::Navigation` (no handle exists to observe).
pub(crate) async fn wait_for_close(destination: &Destination, every: Duration) {
    match destination.handle() {
        Some(handle) => {
            let mut ticks = tokio::time::interval(every);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick fires immediately; a context closed before
            // monitoring started is still detected.
            loop {
                ticks.tick().await;
                if handle.is_closed() {
                    return;
                }
            }
        }
        None => futures::future::pending().await,
    }
}
