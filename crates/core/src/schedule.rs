//! Schedule model - the due-date record the execution engine works on.

use serde::{Deserialize, Serialize};
use crate::error::CoreError;
use crate::id::{ScheduleId, TaskId};
use crate::Time;

/// When a task should run, and whether it already has.
///
/// `executed_at` is `Some` exactly when `executed` is true. Once executed,
/// a schedule is never changed again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    /// Unique identifier
    pub id: ScheduleId,

    /// Task this schedule belongs to
    pub task_id: TaskId,

    /// Instant at which the task becomes due
    pub scheduled_time: Time,

    /// Whether the execution engine has processed this schedule
    pub executed: bool,

    /// When it was processed
    pub executed_at: Option<Time>,
}

impl Schedule {
    /// Create a new, unexecuted schedule.
    pub fn new(task_id: TaskId, scheduled_time: Time) -> Self {
        Self {
            id: ScheduleId::new(),
            task_id,
            scheduled_time,
            executed: false,
            executed_at: None,
        }
    }

    /// Due and not yet executed at `now`.
    pub fn is_due(&self, now: Time) -> bool {
        !self.executed && self.scheduled_time <= now
    }

    /// Mark as executed. Returns false if it already was.
    pub fn mark_executed(&mut self, now: Time) -> bool {
        if self.executed {
            return false;
        }
        self.executed = true;
        self.executed_at = Some(now);
        true
    }

    /// Move the schedule to a new time.
    pub fn reschedule(&mut self, scheduled_time: Time) -> Result<(), CoreError> {
        if self.executed {
            return Err(CoreError::ScheduleAlreadyExecuted(self.id));
        }
        self.scheduled_time = scheduled_time;
        Ok(())
    }
}

/// A due schedule joined with the task and owner data needed to execute it.
///
/// This is a read-only projection assembled by the schedule store, not a
/// live view of the task or user rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueSchedule {
    /// Schedule being executed
    pub schedule_id: ScheduleId,
    /// Owning task
    pub task_id: TaskId,
    /// Task title
    pub title: String,
    /// Task description
    pub description: Option<String>,
    /// Owner's email address
    pub owner_email: String,
    /// Owner's display name
    pub owner_name: String,
    /// When the schedule came due
    pub scheduled_time: Time,
}
