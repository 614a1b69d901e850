//! Audit log - append-only record of what happened to a task.

use serde::{Deserialize, Serialize};
use crate::error::CoreError;
use crate::id::{LogId, ScheduleId, TaskId};
use crate::Time;

/// One audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique identifier
    pub id: LogId,

    /// Task the action was taken against
    pub task_id: TaskId,

    /// Schedule context, when there is one
    pub schedule_id: Option<ScheduleId>,

    /// What was done
    pub action: LogAction,

    /// Whether it worked
    pub status: Outcome,

    /// Human-readable detail
    pub message: String,

    /// Whether a notification email went out
    pub email_sent: bool,

    /// When the entry was written
    pub created_at: Time,
}

impl LogEntry {
    /// Create a new entry with no schedule context and no email.
    pub fn new(
        task_id: TaskId,
        action: LogAction,
        status: Outcome,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: LogId::new(),
            task_id,
            schedule_id: None,
            action,
            status,
            message: message.into(),
            email_sent: false,
            created_at: chrono::Utc::now(),
        }
    }

    /// Attach the schedule the action concerns.
    pub fn with_schedule(mut self, schedule_id: ScheduleId) -> Self {
        self.schedule_id = Some(schedule_id);
        self
    }

    /// Record whether an email was sent.
    pub fn with_email_sent(mut self, sent: bool) -> Self {
        self.email_sent = sent;
        self
    }

    /// Whether this entry records an execution outcome.
    pub fn is_execution(&self) -> bool {
        self.action.is_execution()
    }
}

/// Kinds of audited actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogAction {
    /// Task and its schedule were created
    TaskCreated,
    /// Task fields were edited
    TaskUpdated,
    /// Schedule time was changed
    ScheduleUpdated,
    /// Engine executed the task
    TaskExecuted,
    /// Engine failed to execute the task
    TaskExecutionFailed,
}

impl LogAction {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogAction::TaskCreated => "task_created",
            LogAction::TaskUpdated => "task_updated",
            LogAction::ScheduleUpdated => "schedule_updated",
            LogAction::TaskExecuted => "task_executed",
            LogAction::TaskExecutionFailed => "task_execution_failed",
        }
    }

    /// Actions written by the execution engine.
    pub fn is_execution(&self) -> bool {
        matches!(self, LogAction::TaskExecuted | LogAction::TaskExecutionFailed)
    }
}

impl std::fmt::Display for LogAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task_created" => Ok(LogAction::TaskCreated),
            "task_updated" => Ok(LogAction::TaskUpdated),
            "schedule_updated" => Ok(LogAction::ScheduleUpdated),
            "task_executed" => Ok(LogAction::TaskExecuted),
            "task_execution_failed" => Ok(LogAction::TaskExecutionFailed),
            other => Err(CoreError::InvalidAction(other.to_string())),
        }
    }
}

/// Success or failure of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// It worked
    Success,
    /// It did not
    Failed,
}

impl Outcome {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Outcome {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Outcome::Success),
            "failed" => Ok(Outcome::Failed),
            other => Err(CoreError::InvalidOutcome(other.to_string())),
        }
    }
}

/// Aggregate counts over a task's log entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStats {
    /// Number of entries
    pub total_executions: u64,
    /// Entries with status `success`
    pub successful: u64,
    /// Entries with status `failed`
    pub failed: u64,
    /// Entries that recorded a sent email
    pub emails_sent: u64,
}

impl LogStats {
    /// Compute stats from a set of entries.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a LogEntry>) -> Self {
        entries.into_iter().fold(Self::default(), |mut stats, entry| {
            stats.total_executions += 1;
            match entry.status {
                Outcome::Success => stats.successful += 1,
                Outcome::Failed => stats.failed += 1,
            }
            if entry.email_sent {
                stats.emails_sent += 1;
            }
            stats
        })
    }
}
