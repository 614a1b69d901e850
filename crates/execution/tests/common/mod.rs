//! Shared fixtures: a fault-injecting store and a recording notifier.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;
use tasksched_core::{
    DueSchedule, LogEntry, LogId, LogStats, Schedule, ScheduleId, Task, TaskFilter, TaskId,
    TaskStatus, TaskUpdate, Time, User, UserId,
};
use tasksched_notify::{NotificationKind, Notifier, TemplateData};
use tasksched_storage::{
    LogStore, MemoryStorage, Result, ScheduleStore, StorageError, TaskStore, UserStore,
};

/// Faults that can be switched on per test.
#[derive(Default)]
pub struct Faults {
    pub due_query: AtomicBool,
    pub mark_executed: AtomicBool,
    /// Fails only the transition to `completed`
    pub complete_task: AtomicBool,
    /// Fails every status update
    pub any_status: AtomicBool,
    pub append_log: AtomicBool,
    /// Completes the task and claims the schedule just before a reschedule
    /// write lands, as a concurrent cycle would
    pub claim_before_reschedule: AtomicBool,
    /// Fails the transition to `completed` for these tasks only
    pub complete_for: Mutex<Vec<TaskId>>,
}

fn unavailable(what: &str) -> StorageError {
    StorageError::Unavailable(format!("{} failed (injected)", what))
}

/// Delegates to [`MemoryStorage`] unless a fault is switched on.
#[derive(Clone, Default)]
pub struct FlakyStorage {
    pub inner: MemoryStorage,
    pub faults: Arc<Faults>,
    pub mark_calls: Arc<AtomicUsize>,
}

impl FlakyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, flag: impl Fn(&Faults) -> &AtomicBool) {
        flag(&self.faults).store(true, Ordering::SeqCst);
    }

    pub fn fail_completion_of(&self, task_id: TaskId) {
        self.faults.complete_for.lock().unwrap().push(task_id);
    }
}

#[async_trait]
impl UserStore for FlakyStorage {
    async fn create_user(&self, user: &User) -> Result<()> {
        self.inner.create_user(user).await
    }

    async fn load_user(&self, id: UserId) -> Result<Option<User>> {
        self.inner.load_user(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.inner.find_user_by_email(email).await
    }
}

#[async_trait]
impl TaskStore for FlakyStorage {
    async fn create_task(&self, task: &Task) -> Result<()> {
        self.inner.create_task(task).await
    }

    async fn load_task(&self, id: TaskId) -> Result<Option<Task>> {
        self.inner.load_task(id).await
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.inner.list_tasks(filter).await
    }

    async fn update_task(&self, id: TaskId, update: &TaskUpdate) -> Result<bool> {
        self.inner.update_task(id, update).await
    }

    async fn update_status(&self, id: TaskId, status: TaskStatus) -> Result<bool> {
        if self.faults.any_status.load(Ordering::SeqCst) {
            return Err(unavailable("update_status"));
        }
        if status == TaskStatus::Completed && self.faults.complete_task.load(Ordering::SeqCst) {
            return Err(unavailable("update_status"));
        }
        if status == TaskStatus::Completed && self.faults.complete_for.lock().unwrap().contains(&id) {
            return Err(unavailable("update_status"));
        }
        self.inner.update_status(id, status).await
    }

    async fn delete_task(&self, id: TaskId) -> Result<bool> {
        self.inner.delete_task(id).await
    }
}

#[async_trait]
impl ScheduleStore for FlakyStorage {
    async fn create_schedule(&self, schedule: &Schedule) -> Result<()> {
        self.inner.create_schedule(schedule).await
    }

    async fn load_schedule(&self, id: ScheduleId) -> Result<Option<Schedule>> {
        self.inner.load_schedule(id).await
    }

    async fn list_schedules_for_task(&self, task_id: TaskId) -> Result<Vec<Schedule>> {
        self.inner.list_schedules_for_task(task_id).await
    }

    async fn find_due_unexecuted(&self, now: Time, limit: Option<usize>) -> Result<Vec<DueSchedule>> {
        if self.faults.due_query.load(Ordering::SeqCst) {
            return Err(unavailable("find_due_unexecuted"));
        }
        self.inner.find_due_unexecuted(now, limit).await
    }

    async fn find_upcoming(&self, owner: UserId, now: Time, limit: usize) -> Result<Vec<Schedule>> {
        self.inner.find_upcoming(owner, now, limit).await
    }

    async fn mark_executed(&self, id: ScheduleId, now: Time) -> Result<bool> {
        self.mark_calls.fetch_add(1, Ordering::SeqCst);
        if self.faults.mark_executed.load(Ordering::SeqCst) {
            return Err(unavailable("mark_executed"));
        }
        self.inner.mark_executed(id, now).await
    }

    async fn reschedule(&self, id: ScheduleId, scheduled_time: Time) -> Result<bool> {
        if self.faults.claim_before_reschedule.load(Ordering::SeqCst) {
            if let Some(schedule) = self.inner.load_schedule(id).await? {
                self.inner.mark_executed(id, chrono::Utc::now()).await?;
                self.inner.update_status(schedule.task_id, TaskStatus::Completed).await?;
            }
        }
        self.inner.reschedule(id, scheduled_time).await
    }

    async fn delete_schedule(&self, id: ScheduleId) -> Result<bool> {
        self.inner.delete_schedule(id).await
    }
}

#[async_trait]
impl LogStore for FlakyStorage {
    async fn append_log(&self, entry: &LogEntry) -> Result<LogId> {
        if self.faults.append_log.load(Ordering::SeqCst) {
            return Err(unavailable("append_log"));
        }
        self.inner.append_log(entry).await
    }

    async fn list_logs_for_task(&self, task_id: TaskId, limit: usize) -> Result<Vec<LogEntry>> {
        self.inner.list_logs_for_task(task_id, limit).await
    }

    async fn list_logs_for_user(&self, owner: UserId, limit: usize) -> Result<Vec<LogEntry>> {
        self.inner.list_logs_for_user(owner, limit).await
    }

    async fn task_log_stats(&self, task_id: TaskId) -> Result<LogStats> {
        self.inner.task_log_stats(task_id).await
    }
}

/// One recorded send.
#[derive(Debug, Clone)]
pub struct Sent {
    pub kind: NotificationKind,
    pub recipient: String,
    pub data: TemplateData,
}

/// Notifier that records every attempt and answers with a fixed result.
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Sent>>,
    pub succeed: AtomicBool,
}

impl RecordingNotifier {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            succeed: AtomicBool::new(true),
        })
    }

    pub fn broken() -> Arc<Self> {
        let notifier = Self::healthy();
        notifier.succeed.store(false, Ordering::SeqCst);
        notifier
    }

    pub fn attempts(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, kind: NotificationKind, recipient: &str, data: &TemplateData) -> bool {
        self.sent.lock().unwrap().push(Sent {
            kind,
            recipient: recipient.to_string(),
            data: data.clone(),
        });
        self.succeed.load(Ordering::SeqCst)
    }
}

/// Insert a task with one schedule for the shared test user.
pub async fn seed(store: &MemoryStorage, title: &str, scheduled_time: Time) -> (User, Task, Schedule) {
    let user = match store.find_user_by_email("ada@example.com").await.unwrap() {
        Some(user) => user,
        None => {
            let user = User::new("Ada", "ada@example.com");
            store.create_user(&user).await.unwrap();
            user
        }
    };
    let task = Task::new(user.id, title, Some(format!("{} details", title)));
    store.create_task(&task).await.unwrap();
    let schedule = Schedule::new(task.id, scheduled_time);
    store.create_schedule(&schedule).await.unwrap();
    (user, task, schedule)
}

pub fn minutes(n: i64) -> Duration {
    Duration::minutes(n)
}
