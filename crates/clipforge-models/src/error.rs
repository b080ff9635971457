//! Model validation and state transition errors.

use thiserror::Error;

use crate::job::JobStage;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Invalid time range {start}..{end}: {reason}")]
    InvalidRange {
        start: f64,
        end: f64,
        reason: &'static str,
    },
}

/// Rejected job state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Job is already {0} and cannot change")]
    AlreadyTerminal(JobStage),

    #[error("Cannot move job from {from} back to {to}")]
    Backwards { from: JobStage, to: JobStage },

    #[error("Stage {0} must be reached through complete() or fail()")]
    TerminalViaAdvance(JobStage),
}
