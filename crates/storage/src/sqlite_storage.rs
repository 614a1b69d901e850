//! SQLite storage backend.
//!
//! Relational schema with one table per model. Instants are stored as
//! UTC milliseconds so that range comparisons and ordering happen in SQL.

use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tasksched_core::{
    DueSchedule, LogEntry, LogId, LogStats, Schedule, ScheduleId, Task, TaskFilter, TaskId,
    TaskStatus, TaskUpdate, Time, User, UserId,
};
use tracing::debug;

use super::trait_::{LogStore, Result, ScheduleStore, StorageError, TaskStore, UserStore};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS tasks (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        description TEXT,
        status TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS schedules (
        id TEXT PRIMARY KEY,
        task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
        scheduled_time INTEGER NOT NULL,
        executed INTEGER NOT NULL DEFAULT 0,
        executed_at INTEGER
    )",
    "CREATE TABLE IF NOT EXISTS logs (
        id TEXT PRIMARY KEY,
        task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
        schedule_id TEXT REFERENCES schedules(id) ON DELETE SET NULL,
        action TEXT NOT NULL,
        status TEXT NOT NULL,
        message TEXT NOT NULL,
        email_sent INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_schedules_due ON schedules(executed, scheduled_time)",
    "CREATE INDEX IF NOT EXISTS idx_logs_task ON logs(task_id, created_at)",
];

/// SQLite storage implementation.
#[derive(Clone)]
pub struct SqliteStorage {
    /// Database connection pool
    pool: sqlx::SqlitePool,
}

impl SqliteStorage {
    /// Connect to a database URL such as `sqlite://tasksched.db`, creating
    /// the file and schema if missing.
    pub async fn new(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().max_connections(5).connect_with(options).await?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Open a database file.
    pub async fn new_from_path(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().max_connections(5).connect_with(options).await?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Create an in-memory database for testing.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        // One long-lived connection: every new connection would see a fresh database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Initialize the database schema.
    async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("sqlite schema ready");
        Ok(())
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn millis(time: Time) -> i64 {
    time.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<Time> {
    chrono::DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StorageError::Decode(format!("timestamp out of range: {}", ms)))
}

fn parse<T>(value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse().map_err(|e: T::Err| StorageError::Decode(format!("{}: {}", value, e)))
}

fn get_string(row: &SqliteRow, column: &str) -> Result<String> {
    Ok(row.try_get(column)?)
}

fn user_from_row(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: parse(&get_string(row, "id")?)?,
        name: get_string(row, "name")?,
        email: get_string(row, "email")?,
        password_hash: get_string(row, "password_hash")?,
        created_at: from_millis(row.try_get("created_at")?)?,
        updated_at: from_millis(row.try_get("updated_at")?)?,
    })
}

fn task_from_row(row: &SqliteRow) -> Result<Task> {
    Ok(Task {
        id: parse(&get_string(row, "id")?)?,
        owner: parse(&get_string(row, "user_id")?)?,
        title: get_string(row, "title")?,
        description: row.try_get("description")?,
        status: parse(&get_string(row, "status")?)?,
        created_at: from_millis(row.try_get("created_at")?)?,
        updated_at: from_millis(row.try_get("updated_at")?)?,
    })
}

fn schedule_from_row(row: &SqliteRow) -> Result<Schedule> {
    let executed_at: Option<i64> = row.try_get("executed_at")?;
    Ok(Schedule {
        id: parse(&get_string(row, "id")?)?,
        task_id: parse(&get_string(row, "task_id")?)?,
        scheduled_time: from_millis(row.try_get("scheduled_time")?)?,
        executed: row.try_get("executed")?,
        executed_at: executed_at.map(from_millis).transpose()?,
    })
}

fn log_from_row(row: &SqliteRow) -> Result<LogEntry> {
    let schedule_id: Option<String> = row.try_get("schedule_id")?;
    Ok(LogEntry {
        id: parse(&get_string(row, "id")?)?,
        task_id: parse(&get_string(row, "task_id")?)?,
        schedule_id: schedule_id.as_deref().map(parse).transpose()?,
        action: parse(&get_string(row, "action")?)?,
        status: parse(&get_string(row, "status")?)?,
        message: get_string(row, "message")?,
        email_sent: row.try_get("email_sent")?,
        created_at: from_millis(row.try_get("created_at")?)?,
    })
}

fn due_from_row(row: &SqliteRow) -> Result<DueSchedule> {
    Ok(DueSchedule {
        schedule_id: parse(&get_string(row, "id")?)?,
        task_id: parse(&get_string(row, "task_id")?)?,
        title: get_string(row, "title")?,
        description: row.try_get("description")?,
        owner_email: get_string(row, "email")?,
        owner_name: get_string(row, "user_name")?,
        scheduled_time: from_millis(row.try_get("scheduled_time")?)?,
    })
}

fn as_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl UserStore for SqliteStorage {
    async fn create_user(&self, user: &User) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(millis(user.created_at))
        .bind(millis(user.updated_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StorageError::Conflict(format!("email {} already registered", user.email)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn load_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }
}

#[async_trait]
impl TaskStore for SqliteStorage {
    async fn create_task(&self, task: &Task) -> Result<()> {
        sqlx::query(
            "INSERT INTO tasks (id, user_id, title, description, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(task.id.to_string())
        .bind(task.owner.to_string())
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(millis(task.created_at))
        .bind(millis(task.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_task(&self, id: TaskId) -> Result<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let rows = match filter.owner {
            Some(owner) => {
                sqlx::query("SELECT * FROM tasks WHERE user_id = ? ORDER BY created_at DESC, id DESC")
                    .bind(owner.to_string())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM tasks ORDER BY created_at DESC, id DESC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut tasks = rows.iter().map(task_from_row).collect::<Result<Vec<_>>>()?;

        // Status sets are small; filter after decoding.
        tasks.retain(|t| filter.matches(t));
        Ok(tasks)
    }

    async fn update_task(&self, id: TaskId, update: &TaskUpdate) -> Result<bool> {
        if update.is_empty() {
            return Ok(false);
        }

        let mut fields = Vec::new();
        if update.title.is_some() {
            fields.push("title = ?");
        }
        if update.description.is_some() {
            fields.push("description = ?");
        }
        if update.status.is_some() {
            fields.push("status = ?");
        }
        let sql = format!("UPDATE tasks SET {}, updated_at = ? WHERE id = ?", fields.join(", "));

        let mut query = sqlx::query(&sql);
        if let Some(title) = &update.title {
            query = query.bind(title.clone());
        }
        if let Some(description) = &update.description {
            query = query.bind(description.clone());
        }
        if let Some(status) = update.status {
            query = query.bind(status.as_str());
        }
        let result = query
            .bind(millis(chrono::Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_status(&self, id: TaskId, status: TaskStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(millis(chrono::Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_task(&self, id: TaskId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ScheduleStore for SqliteStorage {
    async fn create_schedule(&self, schedule: &Schedule) -> Result<()> {
        sqlx::query(
            "INSERT INTO schedules (id, task_id, scheduled_time, executed, executed_at)
            VALUES (?, ?, ?, ?, ?)",
        )
        .bind(schedule.id.to_string())
        .bind(schedule.task_id.to_string())
        .bind(millis(schedule.scheduled_time))
        .bind(schedule.executed)
        .bind(schedule.executed_at.map(millis))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_schedule(&self, id: ScheduleId) -> Result<Option<Schedule>> {
        let row = sqlx::query("SELECT * FROM schedules WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(schedule_from_row).transpose()
    }

    async fn list_schedules_for_task(&self, task_id: TaskId) -> Result<Vec<Schedule>> {
        let rows = sqlx::query("SELECT * FROM schedules WHERE task_id = ? ORDER BY scheduled_time DESC")
            .bind(task_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(schedule_from_row).collect()
    }

    async fn find_due_unexecuted(&self, now: Time, limit: Option<usize>) -> Result<Vec<DueSchedule>> {
        // LIMIT -1 means no limit in SQLite.
        let rows = sqlx::query(
            "SELECT s.id, s.task_id, s.scheduled_time, t.title, t.description, u.email, u.name AS user_name
            FROM schedules s
            JOIN tasks t ON s.task_id = t.id
            JOIN users u ON t.user_id = u.id
            WHERE s.executed = 0 AND s.scheduled_time <= ?
            ORDER BY s.scheduled_time ASC, s.id ASC
            LIMIT ?",
        )
        .bind(millis(now))
        .bind(limit.map(as_limit).unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(due_from_row).collect()
    }

    async fn find_upcoming(&self, owner: UserId, now: Time, limit: usize) -> Result<Vec<Schedule>> {
        let rows = sqlx::query(
            "SELECT s.*
            FROM schedules s
            JOIN tasks t ON s.task_id = t.id
            WHERE t.user_id = ? AND s.executed = 0 AND s.scheduled_time > ?
            ORDER BY s.scheduled_time ASC, s.id ASC
            LIMIT ?",
        )
        .bind(owner.to_string())
        .bind(millis(now))
        .bind(as_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(schedule_from_row).collect()
    }

    async fn mark_executed(&self, id: ScheduleId, now: Time) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE schedules SET executed = 1, executed_at = ? WHERE id = ? AND executed = 0",
        )
        .bind(millis(now))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn reschedule(&self, id: ScheduleId, scheduled_time: Time) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE schedules SET scheduled_time = ? WHERE id = ? AND executed = 0",
        )
        .bind(millis(scheduled_time))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_schedule(&self, id: ScheduleId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM schedules WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl LogStore for SqliteStorage {
    async fn append_log(&self, entry: &LogEntry) -> Result<LogId> {
        sqlx::query(
            "INSERT INTO logs (id, task_id, schedule_id, action, status, message, email_sent, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.id.to_string())
        .bind(entry.task_id.to_string())
        .bind(entry.schedule_id.map(|id| id.to_string()))
        .bind(entry.action.as_str())
        .bind(entry.status.as_str())
        .bind(&entry.message)
        .bind(entry.email_sent)
        .bind(millis(entry.created_at))
        .execute(&self.pool)
        .await?;

        Ok(entry.id)
    }

    async fn list_logs_for_task(&self, task_id: TaskId, limit: usize) -> Result<Vec<LogEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM logs WHERE task_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(task_id.to_string())
        .bind(as_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(log_from_row).collect()
    }

    async fn list_logs_for_user(&self, owner: UserId, limit: usize) -> Result<Vec<LogEntry>> {
        let rows = sqlx::query(
            "SELECT l.*
            FROM logs l
            JOIN tasks t ON l.task_id = t.id
            WHERE t.user_id = ?
            ORDER BY l.created_at DESC, l.id DESC
            LIMIT ?",
        )
        .bind(owner.to_string())
        .bind(as_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(log_from_row).collect()
    }

    async fn task_log_stats(&self, task_id: TaskId) -> Result<LogStats> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) AS total_executions,
                COALESCE(SUM(CASE WHEN status = 'success' THEN 1 ELSE 0 END), 0) AS successful,
                COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0) AS failed,
                COALESCE(SUM(CASE WHEN email_sent = 1 THEN 1 ELSE 0 END), 0) AS emails_sent
            FROM logs
            WHERE task_id = ?",
        )
        .bind(task_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        let count = |column: &str| -> Result<u64> {
            let value: i64 = row.try_get(column)?;
            Ok(u64::try_from(value).unwrap_or(0))
        };

        Ok(LogStats {
            total_executions: count("total_executions")?,
            successful: count("successful")?,
            failed: count("failed")?,
            emails_sent: count("emails_sent")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, SubsecRound, Utc};
    use tasksched_core::{LogAction, Outcome};

    fn now() -> Time {
        Utc::now().trunc_subsecs(3)
    }

    async fn seed(storage: &SqliteStorage) -> (User, Task) {
        let user = User::new("Ada", "ada@example.com");
        storage.create_user(&user).await.unwrap();
        let task = Task::new(user.id, "Send report", None);
        storage.create_task(&task).await.unwrap();
        (user, task)
    }

    #[tokio::test]
    async fn test_user_round_trip_and_conflict() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        let user = User::new("Ada", "ada@example.com").with_password_hash("x");
        storage.create_user(&user).await.unwrap();

        let loaded = storage.find_user_by_email("ada@example.com").await.unwrap().unwrap();
        assert_eq!(loaded.id, user.id);
        assert_eq!(loaded.password_hash, "x");

        let err = storage.create_user(&User::new("Other", "ada@example.com")).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_task_operations() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        let (user, task) = seed(&storage).await;

        let loaded = storage.load_task(task.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Send report");
        assert_eq!(loaded.status, TaskStatus::Scheduled);
        assert_eq!(loaded.description, None);

        let update = TaskUpdate {
            description: Some("with charts".to_string()),
            ..Default::default()
        };
        assert!(storage.update_task(task.id, &update).await.unwrap());
        assert!(storage.update_status(task.id, TaskStatus::Completed).await.unwrap());
        assert!(!storage.update_status(TaskId::new(), TaskStatus::Completed).await.unwrap());

        let filter = TaskFilter {
            owner: Some(user.id),
            status: Some(vec![TaskStatus::Completed]),
        };
        let tasks = storage.list_tasks(&filter).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].description.as_deref(), Some("with charts"));
    }

    #[tokio::test]
    async fn test_due_query_orders_by_time_then_id() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        let (user, task) = seed(&storage).await;
        let now = now();

        let tie_a = Schedule::new(task.id, now - Duration::minutes(5));
        let tie_b = Schedule::new(task.id, now - Duration::minutes(5));
        let earliest = Schedule::new(task.id, now - Duration::hours(1));
        let at_now = Schedule::new(task.id, now);
        let future = Schedule::new(task.id, now + Duration::seconds(1));
        for s in [&tie_b, &at_now, &future, &tie_a, &earliest] {
            storage.create_schedule(s).await.unwrap();
        }

        let due = storage.find_due_unexecuted(now, None).await.unwrap();
        let ids: Vec<_> = due.iter().map(|d| d.schedule_id).collect();
        let (first_tie, second_tie) = if tie_a.id < tie_b.id { (tie_a.id, tie_b.id) } else { (tie_b.id, tie_a.id) };
        assert_eq!(ids, vec![earliest.id, first_tie, second_tie, at_now.id]);
        assert_eq!(due[0].owner_email, user.email);
        assert_eq!(due[0].owner_name, user.name);
        assert_eq!(due[0].scheduled_time, earliest.scheduled_time);

        let capped = storage.find_due_unexecuted(now, Some(2)).await.unwrap();
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[0].schedule_id, earliest.id);
    }

    #[tokio::test]
    async fn test_mark_executed_is_one_shot() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        let (_, task) = seed(&storage).await;
        let now = now();
        let schedule = Schedule::new(task.id, now - Duration::minutes(1));
        storage.create_schedule(&schedule).await.unwrap();

        assert!(storage.mark_executed(schedule.id, now).await.unwrap());
        assert!(!storage.mark_executed(schedule.id, now + Duration::minutes(1)).await.unwrap());

        let loaded = storage.load_schedule(schedule.id).await.unwrap().unwrap();
        assert!(loaded.executed);
        assert_eq!(loaded.executed_at, Some(now));
        assert!(storage.find_due_unexecuted(now, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reschedule_never_clears_execution() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        let (_, task) = seed(&storage).await;
        let now = now();
        let schedule = Schedule::new(task.id, now);
        storage.create_schedule(&schedule).await.unwrap();

        let moved = now + Duration::hours(1);
        assert!(storage.reschedule(schedule.id, moved).await.unwrap());
        assert!(storage.mark_executed(schedule.id, moved).await.unwrap());
        assert!(!storage.reschedule(schedule.id, moved + Duration::hours(1)).await.unwrap());

        let stored = storage.load_schedule(schedule.id).await.unwrap().unwrap();
        assert!(stored.executed);
        assert_eq!(stored.executed_at, Some(moved));
        assert_eq!(stored.scheduled_time, moved);
    }

    #[tokio::test]
    async fn test_logs_and_stats() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        let (user, task) = seed(&storage).await;
        let schedule = Schedule::new(task.id, now());
        storage.create_schedule(&schedule).await.unwrap();

        storage
            .append_log(&LogEntry::new(task.id, LogAction::TaskCreated, Outcome::Success, "created")
                .with_schedule(schedule.id))
            .await
            .unwrap();
        storage
            .append_log(&LogEntry::new(task.id, LogAction::TaskExecuted, Outcome::Success, "ran")
                .with_schedule(schedule.id)
                .with_email_sent(true))
            .await
            .unwrap();

        let stats = storage.task_log_stats(task.id).await.unwrap();
        assert_eq!(stats.total_executions, 2);
        assert_eq!(stats.successful, 2);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.emails_sent, 1);

        let logs = storage.list_logs_for_user(user.id, 1).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].schedule_id, Some(schedule.id));

        let empty = storage.task_log_stats(TaskId::new()).await.unwrap();
        assert_eq!(empty, LogStats::default());
    }

    #[tokio::test]
    async fn test_delete_task_cascades() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        let (_, task) = seed(&storage).await;
        let schedule = Schedule::new(task.id, now());
        storage.create_schedule(&schedule).await.unwrap();

        assert!(storage.delete_task(task.id).await.unwrap());
        assert!(storage.load_schedule(schedule.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_backed_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasksched.db");

        let user = User::new("Ada", "ada@example.com");
        {
            let storage = SqliteStorage::new_from_path(&path).await.unwrap();
            storage.create_user(&user).await.unwrap();
            storage.close().await;
        }

        let storage = SqliteStorage::new_from_path(&path).await.unwrap();
        assert!(storage.load_user(user.id).await.unwrap().is_some());
    }
}
