//! Storage-poll transport for embedded and mobile views
//!
//! Opener messaging is unreliable inside embedded webviews, so the callback
//! context writes its terminal result to the persistent store instead. The
//! opener side prefers the store's change notification for near-real-time
//! pickup and additionally runs a low-frequency fallback poll, because some
//! embedded views never fire change events across contexts. The stored
//! result is consumed and deleted on pickup (at-least-once delivery,
//! idempotent consumption).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use li_store::{keys, KeyValueStore};
use li_types::{codes, AuthFailure, FlowResult, StoredResult};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::geometry::{PopupGeometry, ScreenSize};
use crate::host::{ContextOpener, Destination, HostEnvironment};
use crate::transport::{
    wait_for_close, MonitorContext, MonitorEvent, Transport, MOBILE_POPUP_HEIGHT,
    MOBILE_POPUP_WIDTH, POPUP_CHECK_INTERVAL,
};

pub struct StorageTransport {
    opener: Arc<dyn ContextOpener>,
    store: Arc<dyn KeyValueStore>,
    screen: ScreenSize,
    same_window: bool,
    poll_interval: Duration,
    max_wait: Duration,
}

impl StorageTransport {
    pub fn new(
        env: &HostEnvironment,
        same_window: bool,
        poll_interval: Duration,
        max_wait: Duration,
    ) -> Self {
        Self {
            opener: Arc::clone(&env.opener),
            store: Arc::clone(&env.store),
            screen: env.screen,
            same_window,
            poll_interval,
            max_wait,
        }
    }

    /// Consume the stored result if one is present.
    fn take_result(&self) -> Option<MonitorEvent> {
        let raw = self.store.get(keys::RESULT_KEY)?;
        self.store.remove(keys::RESULT_KEY);

        match serde_json::from_str::<StoredResult>(&raw) {
            Ok(stored) => Some(MonitorEvent::Result(stored.into_callback())),
            Err(e) => {
                warn!("Discarding unreadable stored result: {}", e);
                Some(MonitorEvent::Failed(AuthFailure::new(
                    codes::ERR_CALLBACK_PROCESSING_ERROR,
                    format!("Failed to parse stored authentication result: {e}"),
                )))
            }
        }
    }
}

#[async_trait]
impl Transport for StorageTransport {
    fn name(&self) -> &'static str {
        "storage"
    }

    fn open(&self, auth_url: &str) -> FlowResult<Destination> {
        if self.same_window {
            return self.opener.open(auth_url, None);
        }
        let geometry =
            PopupGeometry::centered(self.screen, MOBILE_POPUP_WIDTH, MOBILE_POPUP_HEIGHT);
        self.opener.open(auth_url, Some(&geometry))
    }

    async fn monitor(&self, ctx: MonitorContext) -> MonitorEvent {
        let mut changes = self.store.subscribe();

        let deadline = tokio::time::sleep(self.max_wait);
        tokio::pin!(deadline);

        let closed = wait_for_close(&ctx.destination, POPUP_CHECK_INTERVAL);
        tokio::pin!(closed);

        let mut poll = tokio::time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = poll.tick() => {}
                () = async {
                    match changes.as_mut() {
                        Some(rx) => {
                            // A send error means the store is gone; fall back
                            // to the poll alone.
                            if rx.changed().await.is_err() {
                                futures::future::pending::<()>().await;
                            }
                        }
                        None => futures::future::pending().await,
                    }
                } => {
                    debug!("Storage change notification for attempt {}", ctx.attempt_id);
                }
                () = &mut closed => {
                    debug!("Popup closed before a stored result arrived: {}", ctx.attempt_id);
                    return MonitorEvent::DestinationClosed;
                }
                () = &mut deadline => {
                    warn!("Storage polling timed out for attempt {}", ctx.attempt_id);
                    return MonitorEvent::TimedOut(AuthFailure::new(
                        codes::ERR_POLLING_TIMEOUT,
                        codes::MSG_POLLING_TIMEOUT,
                    ));
                }
            }

            if let Some(event) = self.take_result() {
                return event;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use li_store::MemoryStore;
    use li_types::CallbackResult;

    fn transport(store: Arc<dyn KeyValueStore>) -> StorageTransport {
        struct NoOpener;
        impl ContextOpener for NoOpener {
            fn open(&self, _url: &str, _geometry: Option<&PopupGeometry>) -> FlowResult<Destination> {
                Ok(Destination::Navigation)
            }
        }

        StorageTransport {
            opener: Arc::new(NoOpener),
            store,
            screen: ScreenSize::new(1920, 1080),
            same_window: true,
            poll_interval: Duration::from_millis(10),
            max_wait: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_take_result_consumes_and_deletes() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let stored = StoredResult::from_callback(&CallbackResult::success("AQT", "state"));
        store.set(keys::RESULT_KEY, &serde_json::to_string(&stored).unwrap());

        let transport = transport(Arc::clone(&store));
        let event = transport.take_result().expect("result present");
        assert!(matches!(event, MonitorEvent::Result(r) if r.code.as_deref() == Some("AQT")));
        assert!(store.get(keys::RESULT_KEY).is_none());
    }

    #[test]
    fn test_take_result_classifies_garbage() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set(keys::RESULT_KEY, "not json");

        let transport = transport(Arc::clone(&store));
        let event = transport.take_result().expect("garbage consumed");
        assert!(matches!(
            event,
            MonitorEvent::Failed(f) if f.error == codes::ERR_CALLBACK_PROCESSING_ERROR
        ));
        assert!(store.get(keys::RESULT_KEY).is_none());
    }

    #[test]
    fn test_take_result_empty_store() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let transport = transport(store);
        assert!(transport.take_result().is_none());
    }
}
