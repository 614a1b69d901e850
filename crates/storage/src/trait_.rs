//! Store trait abstractions.
//!
//! Every method is a single atomic operation against the backing store.
//! Nothing here spans more than one row-level write.

use async_trait::async_trait;
use tasksched_core::{
    DueSchedule, LogEntry, LogId, LogStats, Schedule, ScheduleId, Task, TaskFilter, TaskId,
    TaskStatus, TaskUpdate, Time, User, UserId,
};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database driver error
    #[cfg(feature = "sqlite")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value could not be decoded into a model
    #[error("corrupt row: {0}")]
    Decode(String),

    /// Unique constraint violated
    #[error("conflict: {0}")]
    Conflict(String),

    /// Item not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Store cannot be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// User records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. Fails with [`StorageError::Conflict`] on a duplicate email.
    async fn create_user(&self, user: &User) -> Result<()>;

    /// Load a user by ID.
    async fn load_user(&self, id: UserId) -> Result<Option<User>>;

    /// Look a user up by email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
}

/// Task records.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a new task.
    async fn create_task(&self, task: &Task) -> Result<()>;

    /// Load a task by ID.
    async fn load_task(&self, id: TaskId) -> Result<Option<Task>>;

    /// List tasks matching the filter, newest first.
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>>;

    /// Apply a partial update. Returns false if the task does not exist.
    async fn update_task(&self, id: TaskId, update: &TaskUpdate) -> Result<bool>;

    /// Set a task's status. Returns false if the task does not exist.
    async fn update_status(&self, id: TaskId, status: TaskStatus) -> Result<bool>;

    /// Delete a task together with its schedules and log entries.
    async fn delete_task(&self, id: TaskId) -> Result<bool>;
}

/// Schedule records and the due-schedule query.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Insert a new schedule.
    async fn create_schedule(&self, schedule: &Schedule) -> Result<()>;

    /// Load a schedule by ID.
    async fn load_schedule(&self, id: ScheduleId) -> Result<Option<Schedule>>;

    /// All schedules of a task, latest scheduled time first.
    async fn list_schedules_for_task(&self, task_id: TaskId) -> Result<Vec<Schedule>>;

    /// Unexecuted schedules with `scheduled_time <= now`, earliest first,
    /// ties broken by schedule ID. `limit` caps the batch when set.
    async fn find_due_unexecuted(&self, now: Time, limit: Option<usize>) -> Result<Vec<DueSchedule>>;

    /// A user's unexecuted schedules still in the future, earliest first.
    async fn find_upcoming(&self, owner: UserId, now: Time, limit: usize) -> Result<Vec<Schedule>>;

    /// Flip an unexecuted schedule to executed at `now`.
    /// Returns false if no unexecuted schedule with that ID exists.
    async fn mark_executed(&self, id: ScheduleId, now: Time) -> Result<bool>;

    /// Move an unexecuted schedule to a new time.
    /// Returns false if no unexecuted schedule with that ID exists.
    async fn reschedule(&self, id: ScheduleId, scheduled_time: Time) -> Result<bool>;

    /// Delete a schedule.
    async fn delete_schedule(&self, id: ScheduleId) -> Result<bool>;
}

/// Append-only audit log.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append an entry and return its ID.
    async fn append_log(&self, entry: &LogEntry) -> Result<LogId>;

    /// A task's entries, newest first.
    async fn list_logs_for_task(&self, task_id: TaskId, limit: usize) -> Result<Vec<LogEntry>>;

    /// Entries across all tasks a user owns, newest first.
    async fn list_logs_for_user(&self, owner: UserId, limit: usize) -> Result<Vec<LogEntry>>;

    /// Aggregate counts over a task's entries.
    async fn task_log_stats(&self, task_id: TaskId) -> Result<LogStats>;
}

/// Everything a host process needs from one backend.
pub trait Storage: UserStore + TaskStore + ScheduleStore + LogStore {}

impl<T: UserStore + TaskStore + ScheduleStore + LogStore> Storage for T {}
