//! Handshake orchestrator
//!
//! Owns the per-login-attempt lifecycle: generates and persists the CSRF
//! state, builds the authorization URL, opens the destination context through
//! the configured transport, arms monitoring, and on the first terminal event
//! invokes exactly one of the two callbacks and tears everything down exactly
//! once.

use std::sync::Arc;

use li_store::{keys, KeyValueStore};
use li_types::{codes, AuthFailure, CallbackResult, FlowError, FlowResult};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::attempt::{AttemptId, FlowOutcome, FlowStatus};
use crate::host::{Destination, HostEnvironment};
use crate::ident::{generate_session_id, generate_state, STATE_LENGTH};
use crate::transport::{build_transport, MonitorContext, MonitorEvent, Transport, TransportOptions};
use crate::url::{build_authorization_url, DEFAULT_SCOPE};

/// Callback invoked with the authorization code on success.
pub type SuccessCallback = dyn Fn(String) + Send + Sync;

/// Callback invoked with the terminal failure.
pub type ErrorCallback = dyn Fn(AuthFailure) + Send + Sync;

/// Configuration for one login surface.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub client_id: String,
    pub redirect_uri: String,

    /// OAuth scope; defaults to `r_emailaddress`.
    pub scope: String,

    /// Caller-supplied CSRF state override. Generated per attempt when
    /// `None`.
    pub state: Option<String>,

    /// Message delivered when the user closes the destination window.
    pub close_popup_message: String,

    /// Which relay transport to use.
    pub transport: TransportOptions,
}

impl FlowConfig {
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scope: DEFAULT_SCOPE.to_string(),
            state: None,
            close_popup_message: codes::MSG_USER_CLOSED_POPUP.to_string(),
            transport: TransportOptions::default(),
        }
    }

    fn validate(&self) -> FlowResult<()> {
        if self.client_id.trim().is_empty() {
            return Err(FlowError::Configuration("clientId is required".to_string()));
        }
        if self.redirect_uri.trim().is_empty() {
            return Err(FlowError::Configuration(
                "redirectUri is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct AttemptState {
    status: FlowStatus,
    attempt_id: Option<AttemptId>,
    destination: Option<Destination>,
    cancel: Option<CancellationToken>,
    last_outcome: Option<FlowOutcome>,
}

impl AttemptState {
    fn new() -> Self {
        Self {
            status: FlowStatus::Idle,
            attempt_id: None,
            destination: None,
            cancel: None,
            last_outcome: None,
        }
    }
}

/// The login entry point handed to the embedding application.
///
/// Cheap to clone; all clones drive the same underlying attempt slot. Exactly
/// one attempt may be in flight at a time — the idle guard, not the storage
/// layer, rejects concurrent `login()` calls.
#[derive(Clone)]
pub struct LoginFlow {
    config: Arc<FlowConfig>,
    store: Arc<dyn KeyValueStore>,
    transport: Arc<dyn Transport>,
    state: Arc<RwLock<AttemptState>>,
    on_success: Arc<SuccessCallback>,
    on_error: Arc<ErrorCallback>,
}

impl LoginFlow {
    /// Wire a login surface against a host environment.
    pub fn configure(
        config: FlowConfig,
        env: &HostEnvironment,
        on_success: Arc<SuccessCallback>,
        on_error: Arc<ErrorCallback>,
    ) -> Self {
        let transport = build_transport(&config.transport, env);
        Self {
            config: Arc::new(config),
            store: Arc::clone(&env.store),
            transport,
            state: Arc::new(RwLock::new(AttemptState::new())),
            on_success,
            on_error,
        }
    }

    /// Start a login attempt.
    ///
    /// A call while the flow is not idle is a logged no-op. That covers both
    /// an attempt still in flight and the teardown window of a finishing
    /// attempt: a retry issued from inside a terminal callback must wait for
    /// `Idle`, or its freshly persisted state would be wiped by the finishing
    /// attempt's cleanup. Must run inside a tokio runtime; the monitor is
    /// spawned as a task.
    pub fn login(&self) {
        let attempt_id = AttemptId::new();
        {
            let mut state = self.state.write();
            if state.status != FlowStatus::Idle {
                warn!(
                    "Ignoring login() while the flow is {:?} (attempt {})",
                    state.status,
                    state
                        .attempt_id
                        .map(|id| id.to_string())
                        .unwrap_or_default()
                );
                return;
            }
            state.status = FlowStatus::Opening;
            state.attempt_id = Some(attempt_id);
            state.last_outcome = None;
        }

        info!(
            "Starting login attempt {} via {} transport",
            attempt_id,
            self.transport.name()
        );

        if let Err(e) = self.start_attempt(attempt_id) {
            self.finish(attempt_id, FlowStatus::Failed, Err(e.into_failure()));
        }
    }

    fn start_attempt(&self, attempt_id: AttemptId) -> FlowResult<()> {
        self.config.validate()?;

        let state_value = match &self.config.state {
            Some(provided) if !provided.is_empty() => {
                if provided.len() < STATE_LENGTH {
                    warn!(
                        "Caller-supplied state is shorter than {} characters",
                        STATE_LENGTH
                    );
                }
                provided.clone()
            }
            _ => generate_state(),
        };

        let session_id = self
            .transport
            .uses_session_id()
            .then(generate_session_id);

        // Persist before opening: the destination context validates against
        // this slot. A failed write degrades to storage_error, never a panic.
        if !self.store.set(keys::STATE_KEY, &state_value) {
            return Err(FlowError::Storage(codes::MSG_STORAGE_ERROR.to_string()));
        }
        if let Some(session_id) = &session_id {
            if !self.store.set(keys::SESSION_ID_KEY, session_id) {
                return Err(FlowError::Storage(codes::MSG_STORAGE_ERROR.to_string()));
            }
        }
        // Drop any stale result from a previous attempt sharing the slot.
        self.store.remove(keys::RESULT_KEY);

        let wire_state = self
            .transport
            .wire_state(&state_value, session_id.as_deref());
        let auth_url = build_authorization_url(
            &self.config.client_id,
            &self.config.redirect_uri,
            &self.config.scope,
            &wire_state,
        );
        debug!("Authorization URL for {}: {}", attempt_id, auth_url);

        let destination = self.transport.open(&auth_url)?;

        let cancel = CancellationToken::new();
        {
            let mut state = self.state.write();
            // cancel() may have raced the open; honor it by not arming.
            if state.attempt_id != Some(attempt_id) {
                debug!("Attempt {} was cancelled during open", attempt_id);
                if let Some(handle) = destination.handle() {
                    handle.close();
                }
                return Ok(());
            }
            state.status = FlowStatus::AwaitingResponse;
            state.destination = Some(destination.clone());
            state.cancel = Some(cancel.clone());
        }

        let ctx = MonitorContext {
            attempt_id,
            state: state_value,
            session_id,
            destination,
        };
        let flow = self.clone();
        tokio::spawn(async move {
            let event = tokio::select! {
                () = cancel.cancelled() => return,
                event = flow.transport.monitor(ctx) => event,
            };
            flow.resolve(attempt_id, event);
        });

        Ok(())
    }

    /// Classify the first terminal candidate and finish the attempt.
    fn resolve(&self, attempt_id: AttemptId, event: MonitorEvent) {
        match event {
            MonitorEvent::Result(result) => self.resolve_result(attempt_id, result),
            MonitorEvent::DestinationClosed => {
                info!("Attempt {} cancelled by the user", attempt_id);
                self.finish(
                    attempt_id,
                    FlowStatus::Cancelled,
                    Err(AuthFailure::new(
                        codes::ERR_USER_CLOSED_POPUP,
                        self.config.close_popup_message.clone(),
                    )),
                );
            }
            MonitorEvent::TimedOut(failure) => {
                self.finish(attempt_id, FlowStatus::TimedOut, Err(failure));
            }
            MonitorEvent::Failed(failure) => {
                self.finish(attempt_id, FlowStatus::Failed, Err(failure));
            }
        }
    }

    fn resolve_result(&self, attempt_id: AttemptId, result: CallbackResult) {
        // CSRF check against the persisted slot, before any teardown. The
        // original opener variant dropped mismatches silently; here every
        // transport surfaces them the way the storage variant always did.
        let saved_state = self.store.get(keys::STATE_KEY);
        if saved_state.as_deref() != Some(result.state.as_str()) {
            error!(
                "State validation failed for attempt {}: received {:?}",
                attempt_id, result.state
            );
            self.finish(
                attempt_id,
                FlowStatus::Failed,
                Err(AuthFailure::state_mismatch()),
            );
            return;
        }

        if let Some(error) = &result.error {
            let failure = AuthFailure::new(error.clone(), result.error_message());
            self.finish(attempt_id, FlowStatus::Failed, Err(failure));
        } else if let Some(code) = result.code {
            self.finish(attempt_id, FlowStatus::Succeeded, Ok(code));
        } else {
            // Well-formed redirect carrying neither code nor error.
            self.finish(attempt_id, FlowStatus::Failed, Err(AuthFailure::no_code()));
        }
    }

    /// Terminal transition: exactly one callback, then full teardown.
    ///
    /// Ordering matters for the at-most-once guarantee: the monitor handle is
    /// cleared before any callback runs, so a late duplicate event cannot
    /// double-fire; the destination closes after the callback; persisted
    /// state is cleared unconditionally.
    fn finish(
        &self,
        attempt_id: AttemptId,
        status: FlowStatus,
        outcome: Result<String, AuthFailure>,
    ) {
        let (destination, cancel) = {
            let mut state = self.state.write();
            if state.attempt_id != Some(attempt_id) || !state.status.is_in_flight() {
                debug!(
                    "Dropping duplicate terminal event for attempt {}",
                    attempt_id
                );
                return;
            }
            state.status = status;
            (state.destination.take(), state.cancel.take())
        };

        if let Some(cancel) = cancel {
            cancel.cancel();
        }

        let recorded = match outcome {
            Ok(code) => {
                info!("Attempt {} succeeded", attempt_id);
                (self.on_success)(code.clone());
                FlowOutcome::Success { code }
            }
            Err(failure) => {
                info!(
                    "Attempt {} finished with {}: {}",
                    attempt_id, failure.error, failure.error_message
                );
                (self.on_error)(failure.clone());
                FlowOutcome::Failure { status, failure }
            }
        };

        if let Some(destination) = destination {
            if let Some(handle) = destination.handle() {
                handle.close();
            }
        }
        self.clear_persisted();

        let mut state = self.state.write();
        if state.attempt_id == Some(attempt_id) {
            state.status = FlowStatus::Idle;
            state.attempt_id = None;
            state.last_outcome = Some(recorded);
        }
    }

    /// Release all attempt resources synchronously, with no callback firing
    /// afterwards — the host-teardown path.
    pub fn cancel(&self) {
        let (destination, cancel) = {
            let mut state = self.state.write();
            if !state.status.is_in_flight() {
                return;
            }
            info!(
                "Cancelling attempt {}",
                state
                    .attempt_id
                    .map(|id| id.to_string())
                    .unwrap_or_default()
            );
            state.status = FlowStatus::Idle;
            state.attempt_id = None;
            (state.destination.take(), state.cancel.take())
        };

        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(destination) = destination {
            if let Some(handle) = destination.handle() {
                handle.close();
            }
        }
        self.clear_persisted();
    }

    fn clear_persisted(&self) {
        self.store.remove(keys::STATE_KEY);
        self.store.remove(keys::SESSION_ID_KEY);
        self.store.remove(keys::RESULT_KEY);
    }

    /// Whether an attempt is currently in flight.
    pub fn is_loading(&self) -> bool {
        self.state.read().status.is_in_flight()
    }

    pub fn status(&self) -> FlowStatus {
        self.state.read().status
    }

    /// Outcome of the most recently finished attempt, if any.
    pub fn last_outcome(&self) -> Option<FlowOutcome> {
        self.state.read().last_outcome.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = FlowConfig::new("client", "https://app.example/cb");
        assert_eq!(config.scope, DEFAULT_SCOPE);
        assert!(config.state.is_none());
        assert_eq!(config.close_popup_message, codes::MSG_USER_CLOSED_POPUP);
        assert!(matches!(config.transport, TransportOptions::Opener));
    }

    #[test]
    fn test_config_validation() {
        assert!(FlowConfig::new("client", "https://app.example/cb")
            .validate()
            .is_ok());
        assert!(FlowConfig::new("", "https://app.example/cb")
            .validate()
            .is_err());
        assert!(FlowConfig::new("client", "  ").validate().is_err());
    }

    #[test]
    fn test_validation_error_maps_to_configuration_error() {
        let err = FlowConfig::new("", "cb").validate().unwrap_err();
        assert_eq!(err.into_failure().error, codes::ERR_CONFIGURATION_ERROR);
    }
}
