//! Per-attempt identity and lifecycle states

use std::fmt;

use li_types::AuthFailure;
use uuid::Uuid;

/// Unique identifier for one login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptId(Uuid);

impl AttemptId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a login attempt.
///
/// Terminal states are absorbing for the attempt: once one is reached, no
/// further callback fires; teardown then returns the flow to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStatus {
    Idle,
    Opening,
    AwaitingResponse,
    Succeeded,
    Failed,
    Cancelled,
    TimedOut,
}

impl FlowStatus {
    /// Whether an attempt currently owns the persisted-state slot.
    pub fn is_in_flight(self) -> bool {
        matches!(self, FlowStatus::Opening | FlowStatus::AwaitingResponse)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            FlowStatus::Succeeded
                | FlowStatus::Failed
                | FlowStatus::Cancelled
                | FlowStatus::TimedOut
        )
    }
}

/// Recorded outcome of the most recently finished attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    Success {
        code: String,
    },
    Failure {
        status: FlowStatus,
        failure: AuthFailure,
    },
}
