//! In-memory storage backend.
//!
//! Holds every table behind one lock so each operation is atomic. Useful
//! for tests and for running the scheduler without a database.

use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use tasksched_core::{
    DueSchedule, LogEntry, LogId, LogStats, Schedule, ScheduleId, Task, TaskFilter, TaskId,
    TaskStatus, TaskUpdate, Time, User, UserId,
};
use tokio::sync::RwLock;

use super::trait_::{LogStore, Result, ScheduleStore, StorageError, TaskStore, UserStore};

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    tasks: HashMap<TaskId, Task>,
    schedules: HashMap<ScheduleId, Schedule>,
    logs: Vec<LogEntry>,
}

/// Memory-backed storage. Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every log entry in append order.
    pub async fn all_logs(&self) -> Vec<LogEntry> {
        self.tables.read().await.logs.clone()
    }
}

fn newest_first(mut logs: Vec<LogEntry>, limit: usize) -> Vec<LogEntry> {
    logs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    logs.truncate(limit);
    logs
}

#[async_trait]
impl UserStore for MemoryStorage {
    async fn create_user(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StorageError::Conflict(format!("email {} already registered", user.email)));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn load_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }
}

#[async_trait]
impl TaskStore for MemoryStorage {
    async fn create_task(&self, task: &Task) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&task.owner) {
            return Err(StorageError::NotFound(format!("user {}", task.owner)));
        }
        tables.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn load_task(&self, id: TaskId) -> Result<Option<Task>> {
        Ok(self.tables.read().await.tasks.get(&id).cloned())
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let tables = self.tables.read().await;
        let mut tasks: Vec<Task> = tables.tasks.values().filter(|t| filter.matches(t)).cloned().collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tasks)
    }

    async fn update_task(&self, id: TaskId, update: &TaskUpdate) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.tasks.get_mut(&id) {
            Some(task) => {
                task.apply(update);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_status(&self, id: TaskId, status: TaskStatus) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.tasks.get_mut(&id) {
            Some(task) => {
                task.status = status;
                task.updated_at = chrono::Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_task(&self, id: TaskId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.tasks.remove(&id).is_none() {
            return Ok(false);
        }
        tables.schedules.retain(|_, s| s.task_id != id);
        tables.logs.retain(|l| l.task_id != id);
        Ok(true)
    }
}

#[async_trait]
impl ScheduleStore for MemoryStorage {
    async fn create_schedule(&self, schedule: &Schedule) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.tasks.contains_key(&schedule.task_id) {
            return Err(StorageError::NotFound(format!("task {}", schedule.task_id)));
        }
        tables.schedules.insert(schedule.id, schedule.clone());
        Ok(())
    }

    async fn load_schedule(&self, id: ScheduleId) -> Result<Option<Schedule>> {
        Ok(self.tables.read().await.schedules.get(&id).cloned())
    }

    async fn list_schedules_for_task(&self, task_id: TaskId) -> Result<Vec<Schedule>> {
        let tables = self.tables.read().await;
        let mut schedules: Vec<Schedule> = tables
            .schedules
            .values()
            .filter(|s| s.task_id == task_id)
            .cloned()
            .collect();
        schedules.sort_by(|a, b| b.scheduled_time.cmp(&a.scheduled_time));
        Ok(schedules)
    }

    async fn find_due_unexecuted(&self, now: Time, limit: Option<usize>) -> Result<Vec<DueSchedule>> {
        let tables = self.tables.read().await;
        let mut due: Vec<&Schedule> = tables.schedules.values().filter(|s| s.is_due(now)).collect();
        due.sort_by(|a, b| a.scheduled_time.cmp(&b.scheduled_time).then(a.id.cmp(&b.id)));

        let rows = due
            .into_iter()
            .filter_map(|s| {
                // Inner-join semantics: orphans are invisible to the engine.
                let task = tables.tasks.get(&s.task_id)?;
                let owner = tables.users.get(&task.owner)?;
                Some(DueSchedule {
                    schedule_id: s.id,
                    task_id: task.id,
                    title: task.title.clone(),
                    description: task.description.clone(),
                    owner_email: owner.email.clone(),
                    owner_name: owner.name.clone(),
                    scheduled_time: s.scheduled_time,
                })
            })
            .take(limit.unwrap_or(usize::MAX))
            .collect();
        Ok(rows)
    }

    async fn find_upcoming(&self, owner: UserId, now: Time, limit: usize) -> Result<Vec<Schedule>> {
        let tables = self.tables.read().await;
        let mut upcoming: Vec<Schedule> = tables
            .schedules
            .values()
            .filter(|s| !s.executed && s.scheduled_time > now)
            .filter(|s| tables.tasks.get(&s.task_id).is_some_and(|t| t.owner == owner))
            .cloned()
            .collect();
        upcoming.sort_by(|a, b| a.scheduled_time.cmp(&b.scheduled_time).then(a.id.cmp(&b.id)));
        upcoming.truncate(limit);
        Ok(upcoming)
    }

    async fn mark_executed(&self, id: ScheduleId, now: Time) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.schedules.get_mut(&id).is_some_and(|s| s.mark_executed(now)))
    }

    async fn reschedule(&self, id: ScheduleId, scheduled_time: Time) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.schedules.get_mut(&id) {
            Some(schedule) if !schedule.executed => {
                schedule.scheduled_time = scheduled_time;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_schedule(&self, id: ScheduleId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.schedules.remove(&id).is_some())
    }
}

#[async_trait]
impl LogStore for MemoryStorage {
    async fn append_log(&self, entry: &LogEntry) -> Result<LogId> {
        let mut tables = self.tables.write().await;
        if !tables.tasks.contains_key(&entry.task_id) {
            return Err(StorageError::NotFound(format!("task {}", entry.task_id)));
        }
        tables.logs.push(entry.clone());
        Ok(entry.id)
    }

    async fn list_logs_for_task(&self, task_id: TaskId, limit: usize) -> Result<Vec<LogEntry>> {
        let tables = self.tables.read().await;
        let logs = tables.logs.iter().filter(|l| l.task_id == task_id).cloned().collect();
        Ok(newest_first(logs, limit))
    }

    async fn list_logs_for_user(&self, owner: UserId, limit: usize) -> Result<Vec<LogEntry>> {
        let tables = self.tables.read().await;
        let logs = tables
            .logs
            .iter()
            .filter(|l| tables.tasks.get(&l.task_id).is_some_and(|t| t.owner == owner))
            .cloned()
            .collect();
        Ok(newest_first(logs, limit))
    }

    async fn task_log_stats(&self, task_id: TaskId) -> Result<LogStats> {
        let tables = self.tables.read().await;
        Ok(LogStats::from_entries(tables.logs.iter().filter(|l| l.task_id == task_id)))
    }
}
