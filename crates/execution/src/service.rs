//! Task service - the user-facing operations around the engine.
//!
//! Creates tasks together with their schedule, edits and reschedules them,
//! and reads the audit log. Every operation is scoped to an owner.

use std::sync::Arc;

use serde::Serialize;
use tasksched_core::{
    CoreError, LogAction, LogEntry, LogStats, Outcome, Schedule, ScheduleId, Task, TaskFilter,
    TaskId, TaskStatus, TaskUpdate, Time, User, UserId,
};
use tasksched_notify::{NotificationKind, Notifier, TemplateData};
use tasksched_storage::{Storage, StorageError};
use tracing::{error, info, warn};

/// Title length bounds, in characters, after trimming.
const TITLE_MIN: usize = 3;
const TITLE_MAX: usize = 255;

/// Default number of log entries returned.
pub const DEFAULT_LOG_LIMIT: usize = 50;

/// Service errors.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Input rejected
    #[error("validation failed: {0}")]
    Validation(String),

    /// Entity missing or not visible to the caller
    #[error("not found: {0}")]
    NotFound(String),

    /// Entity belongs to another user
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Unique constraint hit
    #[error("conflict: {0}")]
    Conflict(String),

    /// Model rule violated
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Store failure
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict(msg) => ServiceError::Conflict(msg),
            other => ServiceError::Storage(other),
        }
    }
}

/// Service result type.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// A task with its schedules.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskDetail {
    /// The task
    pub task: Task,
    /// Its schedules, latest first
    pub schedules: Vec<Schedule>,
}

/// A task's audit log with aggregate counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskLogs {
    /// Entries, newest first
    pub logs: Vec<LogEntry>,
    /// Counts over every entry of the task
    pub stats: LogStats,
}

/// User-facing task operations.
pub struct TaskService<S> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
}

impl<S: Storage> TaskService<S> {
    /// Create a service over a store and a notifier.
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Register a user and send a welcome email.
    pub async fn register_user(&self, name: &str, email: &str) -> Result<User> {
        let name = name.trim();
        let email = email.trim().to_lowercase();
        if name.is_empty() {
            return Err(ServiceError::Validation("name is required".to_string()));
        }
        if !email.contains('@') {
            return Err(ServiceError::Validation(format!("'{}' is not an email address", email)));
        }
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict(format!("email {} already registered", email)));
        }

        let user = User::new(name, email);
        self.store.create_user(&user).await?;
        info!("User {} registered", user.id);

        let data = TemplateData::welcome(&user.name, &user.email);
        if !self.notifier.send(NotificationKind::Welcome, &user.email, &data).await {
            warn!("Welcome email to {} was not sent", user.email);
        }
        Ok(user)
    }

    /// Look up a user by email.
    pub async fn find_user(&self, email: &str) -> Result<User> {
        let email = email.trim().to_lowercase();
        self.store
            .find_user_by_email(&email)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {}", email)))
    }

    /// Create a task and its schedule.
    pub async fn create_task(
        &self,
        owner: UserId,
        title: &str,
        description: Option<String>,
        scheduled_time: Time,
    ) -> Result<TaskDetail> {
        let title = validate_title(title)?;
        ensure_future(scheduled_time)?;
        let user = self
            .store
            .load_user(owner)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {}", owner)))?;

        let description = description.filter(|d| !d.trim().is_empty());
        let task = Task::new(owner, title, description);
        self.store.create_task(&task).await?;
        let schedule = Schedule::new(task.id, scheduled_time);
        self.store.create_schedule(&schedule).await?;

        let data = TemplateData::task_scheduled(
            &user.name,
            &task.title,
            task.description.clone(),
            scheduled_time,
        );
        let email_sent = self
            .notifier
            .send(NotificationKind::TaskScheduled, &user.email, &data)
            .await;
        if !email_sent {
            warn!("Scheduled email for task #{} was not sent", task.id);
        }

        let entry = LogEntry::new(
            task.id,
            LogAction::TaskCreated,
            Outcome::Success,
            format!("Task \"{}\" created and scheduled", task.title),
        )
        .with_schedule(schedule.id)
        .with_email_sent(email_sent);
        self.append(&entry).await;

        info!("Task #{} scheduled for {}", task.id, scheduled_time);
        Ok(TaskDetail {
            task,
            schedules: vec![schedule],
        })
    }

    /// Apply a partial update to an owned task.
    pub async fn update_task(&self, owner: UserId, task_id: TaskId, update: TaskUpdate) -> Result<Task> {
        if update.is_empty() {
            return Err(ServiceError::Validation("nothing to update".to_string()));
        }
        let mut update = update;
        if let Some(title) = &update.title {
            update.title = Some(validate_title(title)?);
        }

        let mut task = self.owned_task(owner, task_id).await?;
        if !self.store.update_task(task_id, &update).await? {
            return Err(ServiceError::NotFound(format!("task {}", task_id)));
        }
        task.apply(&update);

        let entry = LogEntry::new(task_id, LogAction::TaskUpdated, Outcome::Success, "Task updated");
        self.append(&entry).await;
        Ok(task)
    }

    /// Move an unexecuted schedule to a new future time. The task goes
    /// back to `scheduled`.
    pub async fn reschedule(
        &self,
        owner: UserId,
        schedule_id: ScheduleId,
        scheduled_time: Time,
    ) -> Result<Schedule> {
        let mut schedule = self.owned_schedule(owner, schedule_id).await?;
        schedule.reschedule(scheduled_time)?;
        ensure_future(scheduled_time)?;

        // The engine may have claimed the schedule since it was loaded.
        if !self.store.reschedule(schedule_id, scheduled_time).await? {
            return match self.store.load_schedule(schedule_id).await? {
                Some(current) if current.executed => {
                    Err(CoreError::ScheduleAlreadyExecuted(schedule_id).into())
                }
                _ => Err(ServiceError::NotFound(format!("schedule {}", schedule_id))),
            };
        }
        if !self.store.update_status(schedule.task_id, TaskStatus::Scheduled).await? {
            warn!("Task #{} vanished while rescheduling", schedule.task_id);
        }

        let entry = LogEntry::new(
            schedule.task_id,
            LogAction::ScheduleUpdated,
            Outcome::Success,
            format!("Schedule moved to {}", scheduled_time),
        )
        .with_schedule(schedule_id);
        self.append(&entry).await;
        Ok(schedule)
    }

    /// Delete an owned task with its schedules and logs.
    pub async fn delete_task(&self, owner: UserId, task_id: TaskId) -> Result<()> {
        self.owned_task(owner, task_id).await?;
        if !self.store.delete_task(task_id).await? {
            return Err(ServiceError::NotFound(format!("task {}", task_id)));
        }
        info!("Task #{} deleted", task_id);
        Ok(())
    }

    /// Delete one schedule of an owned task.
    pub async fn delete_schedule(&self, owner: UserId, schedule_id: ScheduleId) -> Result<()> {
        self.owned_schedule(owner, schedule_id).await?;
        if !self.store.delete_schedule(schedule_id).await? {
            return Err(ServiceError::NotFound(format!("schedule {}", schedule_id)));
        }
        Ok(())
    }

    /// List the owner's tasks, newest first.
    pub async fn list_tasks(&self, owner: UserId, status: Option<Vec<TaskStatus>>) -> Result<Vec<Task>> {
        let filter = TaskFilter {
            owner: Some(owner),
            status,
        };
        Ok(self.store.list_tasks(&filter).await?)
    }

    /// A task with its schedules.
    pub async fn task_detail(&self, owner: UserId, task_id: TaskId) -> Result<TaskDetail> {
        let task = self.owned_task(owner, task_id).await?;
        let schedules = self.store.list_schedules_for_task(task_id).await?;
        Ok(TaskDetail { task, schedules })
    }

    /// A task's log entries and stats.
    pub async fn task_logs(&self, owner: UserId, task_id: TaskId, limit: usize) -> Result<TaskLogs> {
        self.owned_task(owner, task_id).await?;
        let logs = self.store.list_logs_for_task(task_id, limit).await?;
        let stats = self.store.task_log_stats(task_id).await?;
        Ok(TaskLogs { logs, stats })
    }

    /// Log entries across all of the owner's tasks, newest first.
    pub async fn user_logs(&self, owner: UserId, limit: usize) -> Result<Vec<LogEntry>> {
        Ok(self.store.list_logs_for_user(owner, limit).await?)
    }

    /// The owner's next unexecuted schedules, earliest first.
    pub async fn upcoming(&self, owner: UserId, limit: usize) -> Result<Vec<Schedule>> {
        Ok(self.store.find_upcoming(owner, chrono::Utc::now(), limit).await?)
    }

    /// Tasks of other users are reported as missing.
    async fn owned_task(&self, owner: UserId, task_id: TaskId) -> Result<Task> {
        match self.store.load_task(task_id).await? {
            Some(task) if task.owner == owner => Ok(task),
            _ => Err(ServiceError::NotFound(format!("task {}", task_id))),
        }
    }

    async fn owned_schedule(&self, owner: UserId, schedule_id: ScheduleId) -> Result<Schedule> {
        let schedule = self
            .store
            .load_schedule(schedule_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("schedule {}", schedule_id)))?;
        match self.store.load_task(schedule.task_id).await? {
            Some(task) if task.owner == owner => Ok(schedule),
            Some(_) => Err(ServiceError::AccessDenied(format!("schedule {}", schedule_id))),
            None => Err(ServiceError::NotFound(format!("task {}", schedule.task_id))),
        }
    }

    /// The audit log is best-effort for user actions.
    async fn append(&self, entry: &LogEntry) {
        if let Err(e) = self.store.append_log(entry).await {
            error!("Failed to write {} log for task #{}: {}", entry.action, entry.task_id, e);
        }
    }
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    let len = title.chars().count();
    if !(TITLE_MIN..=TITLE_MAX).contains(&len) {
        return Err(ServiceError::Validation(format!(
            "title must be {}-{} characters",
            TITLE_MIN, TITLE_MAX
        )));
    }
    Ok(title.to_string())
}

fn ensure_future(time: Time) -> Result<()> {
    if time <= chrono::Utc::now() {
        return Err(ServiceError::Validation("scheduled time must be in the future".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_bounds() {
        assert!(validate_title("ab").is_err());
        assert!(validate_title("   ab   ").is_err());
        assert_eq!(validate_title("  abc ").unwrap(), "abc");
        assert!(validate_title(&"x".repeat(255)).is_ok());
        assert!(validate_title(&"x".repeat(256)).is_err());
    }

    #[test]
    fn test_future_check() {
        assert!(ensure_future(chrono::Utc::now() - chrono::Duration::seconds(1)).is_err());
        assert!(ensure_future(chrono::Utc::now() + chrono::Duration::minutes(5)).is_ok());
    }

    #[test]
    fn test_storage_conflict_maps_to_conflict() {
        let err: ServiceError = StorageError::Conflict("dup".to_string()).into();
        assert!(matches!(err, ServiceError::Conflict(_)));
        let err: ServiceError = StorageError::Unavailable("down".to_string()).into();
        assert!(matches!(err, ServiceError::Storage(_)));
    }
}
