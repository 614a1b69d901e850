//! Errors raised by model-level business rules.

use crate::id::ScheduleId;

/// Errors that can occur when applying a rule to a model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// An executed schedule can no longer be changed
    #[error("schedule {0} has already been executed")]
    ScheduleAlreadyExecuted(ScheduleId),

    /// Unknown task status string
    #[error("invalid task status: {0}")]
    InvalidStatus(String),

    /// Unknown log action string
    #[error("invalid log action: {0}")]
    InvalidAction(String),

    /// Unknown outcome string
    #[error("invalid outcome: {0}")]
    InvalidOutcome(String),
}
