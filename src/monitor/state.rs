//! Monitoring lifecycle: a plain enum plus a pure transition function.
//!
//! ```text
//! NOT_STARTED ──running──▶ RUNNING ──running──▶ AWAITING_THRESHOLD_WINDOW
//!                                                   │ gate open
//!                                                   ▼
//!                 FINISHED ◀──completed / 100%── CHECKING_THRESHOLDS
//! ```
//!
//! Any terminal remote status (completed, timed out, aborted, failed) moves
//! every state straight to FINISHED. Pending, aborting, and unknown statuses
//! leave the state unchanged.

use std::fmt;

use serde::Serialize;

use crate::client::types::RemoteStatus;

/// Where a run is in its monitoring lifecycle. Declaration order is
/// lifecycle order, so `Ord` compares progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitoringState {
    /// Test accepted by the service but not generating load.
    #[default]
    NotStarted,
    /// First tick with the test executing.
    Running,
    /// Warm-up: load is running, thresholds not yet checked.
    AwaitingThresholdWindow,
    /// Thresholds evaluated every tick.
    CheckingThresholds,
    /// Terminal.
    Finished,
}

impl MonitoringState {
    /// States in which load is being produced and progress is tracked.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::Running | Self::AwaitingThresholdWindow | Self::CheckingThresholds
        )
    }

    /// Before threshold checking has begun, but after the test started.
    #[must_use]
    pub const fn is_awaiting_window(self) -> bool {
        matches!(self, Self::AwaitingThresholdWindow)
    }

    #[must_use]
    pub const fn is_checking_thresholds(self) -> bool {
        matches!(self, Self::CheckingThresholds)
    }

    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Finished)
    }
}

impl fmt::Display for MonitoringState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "NOT_STARTED"),
            Self::Running => write!(f, "RUNNING"),
            Self::AwaitingThresholdWindow => write!(f, "AWAITING_THRESHOLD_WINDOW"),
            Self::CheckingThresholds => write!(f, "CHECKING_THRESHOLDS"),
            Self::Finished => write!(f, "FINISHED"),
        }
    }
}

/// Next state given the remote status and, for gated transitions, whether
/// the caller's condition holds.
///
/// The condition means "gate open" in AWAITING_THRESHOLD_WINDOW and
/// "progress reached 100%" in CHECKING_THRESHOLDS; it is ignored elsewhere.
/// The result is never earlier than `state`.
#[must_use]
pub fn next_state(
    state: MonitoringState,
    status: RemoteStatus,
    condition: Option<bool>,
) -> MonitoringState {
    use MonitoringState::{
        AwaitingThresholdWindow, CheckingThresholds, Finished, NotStarted, Running,
    };

    if state == Finished || status.is_terminal() {
        return Finished;
    }

    let condition = condition.unwrap_or(false);
    match state {
        NotStarted if status.is_running() => Running,
        Running if status.is_running() => AwaitingThresholdWindow,
        AwaitingThresholdWindow if status.is_running() && condition => CheckingThresholds,
        CheckingThresholds if condition => Finished,
        other => other,
    }
}
