//! Backend-poll transport
//!
//! For environments where the opener and destination cannot share even
//! persistent storage (separate OS-level browser processes). The session id
//! rides to the server inside the state parameter (`state.sessionId`); the
//! identity provider's redirect lands on the backend, which records the
//! outcome in its session store, and this side polls the status endpoint
//! until a terminal answer or the maximum wait.
//!
//! Network failures during polling are transient by definition here: they are
//! logged and swallowed, and polling continues. Only a definitive server
//! response or the timeout ends the attempt.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use li_types::{codes, AuthFailure, CallbackResult, FlowResult};
use reqwest::Client;
use serde::Deserialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::geometry::{PopupGeometry, ScreenSize};
use crate::host::{ContextOpener, Destination, HostEnvironment};
use crate::transport::{
    wait_for_close, MonitorContext, MonitorEvent, Transport, POPUP_CHECK_INTERVAL, POPUP_HEIGHT,
    POPUP_WIDTH,
};

/// Status payload served by the backend session store.
#[derive(Debug, Deserialize)]
struct PollStatusResponse {
    status: String,

    #[serde(default)]
    code: Option<String>,

    #[serde(default)]
    error: Option<String>,

    #[serde(rename = "errorMessage", default)]
    error_message: Option<String>,
}

pub struct BackendTransport {
    opener: Arc<dyn ContextOpener>,
    client: Client,
    status_endpoint: String,
    screen: ScreenSize,
    poll_interval: Duration,
    max_wait: Duration,
}

impl BackendTransport {
    pub fn new(
        env: &HostEnvironment,
        status_endpoint: String,
        poll_interval: Duration,
        max_wait: Duration,
    ) -> Self {
        Self {
            opener: Arc::clone(&env.opener),
            client: Client::new(),
            status_endpoint,
            screen: env.screen,
            poll_interval,
            max_wait,
        }
    }

    /// One status check. `Ok(None)` means still pending; network and HTTP
    /// failures surface as `Err` and are retried by the caller.
    async fn check(&self, ctx: &MonitorContext, session_id: &str) -> Result<Option<MonitorEvent>, reqwest::Error> {
        let response = self
            .client
            .get(&self.status_endpoint)
            .query(&[("session", session_id)])
            .send()
            .await?
            .error_for_status()?;

        let status: PollStatusResponse = response.json().await?;
        debug!("Polling response for {}: {}", ctx.attempt_id, status.status);

        match status.status.as_str() {
            "completed" => match status.code {
                // The server already correlated this result by session id,
                // so the candidate carries the attempt's own state.
                Some(code) => Ok(Some(MonitorEvent::Result(CallbackResult::success(
                    code,
                    ctx.state.clone(),
                )))),
                None => Ok(Some(MonitorEvent::Failed(AuthFailure::no_code()))),
            },
            "error" => Ok(Some(MonitorEvent::Failed(AuthFailure::new(
                status
                    .error
                    .unwrap_or_else(|| codes::ERR_OAUTH_ERROR.to_string()),
                status
                    .error_message
                    .unwrap_or_else(|| codes::MSG_OAUTH_ERROR.to_string()),
            )))),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl Transport for BackendTransport {
    fn name(&self) -> &'static str {
        "backend"
    }

    fn uses_session_id(&self) -> bool {
        true
    }

    /// `state.sessionId` — the server extracts the substring after the last
    /// `.` to key its session store.
    fn wire_state(&self, state: &str, session_id: Option<&str>) -> String {
        match session_id {
            Some(session_id) => format!("{state}.{session_id}"),
            None => state.to_string(),
        }
    }

    fn open(&self, auth_url: &str) -> FlowResult<Destination> {
        let geometry = PopupGeometry::centered(self.screen, POPUP_WIDTH, POPUP_HEIGHT);
        self.opener.open(auth_url, Some(&geometry))
    }

    async fn monitor(&self, ctx: MonitorContext) -> MonitorEvent {
        let session_id = ctx.session_id.clone().unwrap_or_default();

        let deadline = tokio::time::sleep(self.max_wait);
        tokio::pin!(deadline);

        let closed = wait_for_close(&ctx.destination, POPUP_CHECK_INTERVAL);
        tokio::pin!(closed);

        let mut poll = tokio::time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    match self.check(&ctx, &session_id).await {
                        Ok(Some(event)) => return event,
                        Ok(None) => {}
                        Err(e) => {
                            // Transient infrastructure flakiness; keep polling.
                            debug!("Polling error for {} (will retry): {}", ctx.attempt_id, e);
                        }
                    }
                }
                () = &mut closed => {
                    debug!("Popup closed before backend completion: {}", ctx.attempt_id);
                    return MonitorEvent::DestinationClosed;
                }
                () = &mut deadline => {
                    warn!("Backend polling timed out for attempt {}", ctx.attempt_id);
                    return MonitorEvent::TimedOut(AuthFailure::new(
                        codes::ERR_TIMEOUT,
                        codes::MSG_TIMEOUT,
                    ));
                }
            }
        }
    }
}
