//! Task model - the unit of work a user schedules.

use serde::{Deserialize, Serialize};
use crate::error::CoreError;
use crate::id::{TaskId, UserId};
use crate::Time;

/// A task owned by a user and executed when its schedule comes due.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: TaskId,

    /// Owning user
    pub owner: UserId,

    /// Task title
    pub title: String,

    /// Optional longer description
    pub description: Option<String>,

    /// Current status
    pub status: TaskStatus,

    /// Creation timestamp
    pub created_at: Time,

    /// Last update timestamp
    pub updated_at: Time,
}

impl Task {
    /// Create a new task. Tasks are created together with their schedule,
    /// so they start out `scheduled`.
    pub fn new(owner: UserId, title: impl Into<String>, description: Option<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: TaskId::new(),
            owner,
            title: title.into(),
            description,
            status: TaskStatus::Scheduled,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, update: &TaskUpdate) {
        if let Some(title) = &update.title {
            self.title = title.clone();
        }
        if let Some(description) = &update.description {
            self.description = Some(description.clone());
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        self.updated_at = chrono::Utc::now();
    }
}

/// Task lifecycle status.
///
/// ```text
/// pending → scheduled → completed
///                     ↘ failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created but not yet scheduled
    Pending,
    /// Waiting for its schedule to come due
    Scheduled,
    /// Executed successfully
    Completed,
    /// Execution failed
    Failed,
}

impl TaskStatus {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Scheduled => "scheduled",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Whether the status is terminal for the execution engine.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "scheduled" => Ok(TaskStatus::Scheduled),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// Partial update of a task's user-editable fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdate {
    /// New title
    pub title: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New status
    pub status: Option<TaskStatus>,
}

impl TaskUpdate {
    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.status.is_none()
    }
}

/// Filter for listing tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Only tasks owned by this user
    pub owner: Option<UserId>,
    /// Only tasks in one of these statuses
    pub status: Option<Vec<TaskStatus>>,
}

impl TaskFilter {
    /// Whether a task passes the filter.
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(owner) = self.owner {
            if task.owner != owner {
                return false;
            }
        }
        if let Some(statuses) = &self.status {
            if !statuses.contains(&task.status) {
                return false;
            }
        }
        true
    }
}
