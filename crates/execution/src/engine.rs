//! The execution engine - turns due schedules into executed tasks.
//!
//! One cycle:
//! ```text
//! find due schedules → for each: mark executed → complete task → email → log
//! ```
//! Marking the schedule executed is the commit point: once it succeeds the
//! schedule is never picked up again, whatever happens afterwards.

use std::sync::Arc;
use serde::Serialize;
use tasksched_core::{
    DueSchedule, LogAction, LogEntry, Outcome, ScheduleId, TaskId, TaskStatus, Time,
};
use tasksched_notify::{NotificationKind, Notifier, TemplateData};
use tasksched_storage::{LogStore, ScheduleStore, StorageError, TaskStore};
use tracing::{debug, error, info, warn};

/// Configuration for the execution engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Max schedules processed per cycle (None = all that are due)
    pub max_batch: Option<usize>,
}

/// Errors that stop a single execution or a whole cycle.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// The due-schedule query failed; the cycle did nothing
    #[error("due schedule query failed: {0}")]
    DueQuery(#[source] StorageError),

    /// Marking the schedule executed failed
    #[error("failed to mark schedule executed: {0}")]
    MarkExecuted(#[source] StorageError),

    /// The schedule was missing or already executed when we tried to claim it
    #[error("schedule {0} is missing or already executed")]
    ScheduleUnavailable(ScheduleId),

    /// Completing the task failed
    #[error("failed to update task status: {0}")]
    UpdateStatus(#[source] StorageError),

    /// The task disappeared before it could be completed
    #[error("task {0} not found")]
    TaskMissing(TaskId),
}

/// The execution engine.
pub struct ExecutionEngine<S> {
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
}

impl<S> ExecutionEngine<S>
where
    S: ScheduleStore + TaskStore + LogStore,
{
    /// Create a new execution engine.
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            config: EngineConfig::default(),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Get a reference to the store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run one cycle against the current time.
    pub async fn run_cycle(&self) -> Result<CycleReport, ExecutionError> {
        self.run_cycle_at(chrono::Utc::now()).await
    }

    /// Run one cycle treating `now` as the current instant.
    ///
    /// Only a failing due-schedule query is returned as an error; every
    /// per-schedule failure is handled inside the cycle.
    pub async fn run_cycle_at(&self, now: Time) -> Result<CycleReport, ExecutionError> {
        info!("Checking for due schedules...");

        let due = self
            .store
            .find_due_unexecuted(now, self.config.max_batch)
            .await
            .map_err(ExecutionError::DueQuery)?;

        if due.is_empty() {
            info!("No due schedules found");
            return Ok(CycleReport::empty(now));
        }

        info!("Found {} due schedule(s) to execute", due.len());

        let mut report = CycleReport::empty(now);
        for schedule in &due {
            report.outcomes.push(self.execute_one(schedule, now).await);
        }

        info!(
            "Cycle finished: {} executed, {} failed",
            report.succeeded(),
            report.failed()
        );
        Ok(report)
    }

    /// Execute a single due schedule. Never fails: problems are recorded
    /// in the task status, the audit log and the returned outcome.
    ///
    /// A schedule claimed elsewhere between the due query and the claim is
    /// left to whoever claimed it: nothing is written or sent for it here.
    pub async fn execute_one(&self, schedule: &DueSchedule, now: Time) -> ExecutionOutcome {
        info!("Executing task #{}: {}", schedule.task_id, schedule.title);

        let mut committed = false;
        match self.commit(schedule, now, &mut committed).await {
            Ok(()) => self.complete(schedule, now).await,
            Err(err @ ExecutionError::ScheduleUnavailable(_)) => {
                warn!("Skipping task #{}: {}", schedule.task_id, err);
                ExecutionOutcome {
                    schedule_id: schedule.schedule_id,
                    task_id: schedule.task_id,
                    committed: false,
                    email_sent: false,
                    result: ExecutionResult::Failed {
                        error: err.to_string(),
                    },
                }
            }
            Err(err) => self.fail(schedule, now, committed, err).await,
        }
    }

    /// Steps 1 and 2: claim the schedule, then complete the task.
    async fn commit(
        &self,
        schedule: &DueSchedule,
        now: Time,
        committed: &mut bool,
    ) -> Result<(), ExecutionError> {
        let claimed = self
            .store
            .mark_executed(schedule.schedule_id, now)
            .await
            .map_err(ExecutionError::MarkExecuted)?;
        if !claimed {
            return Err(ExecutionError::ScheduleUnavailable(schedule.schedule_id));
        }
        *committed = true;

        let updated = self
            .store
            .update_status(schedule.task_id, TaskStatus::Completed)
            .await
            .map_err(ExecutionError::UpdateStatus)?;
        if !updated {
            return Err(ExecutionError::TaskMissing(schedule.task_id));
        }
        Ok(())
    }

    /// Steps 3 and 4 after a successful commit.
    async fn complete(&self, schedule: &DueSchedule, now: Time) -> ExecutionOutcome {
        let data = TemplateData::task_executed(
            &schedule.owner_name,
            &schedule.title,
            schedule.description.clone(),
            now,
            Outcome::Success,
        );
        let email_sent = self
            .notifier
            .send(NotificationKind::TaskExecuted, &schedule.owner_email, &data)
            .await;
        if !email_sent {
            warn!("Task #{} executed but the notification email was not sent", schedule.task_id);
        }

        let entry = LogEntry::new(
            schedule.task_id,
            LogAction::TaskExecuted,
            Outcome::Success,
            format!("Task \"{}\" executed successfully", schedule.title),
        )
        .with_schedule(schedule.schedule_id)
        .with_email_sent(email_sent);
        if let Err(e) = self.store.append_log(&entry).await {
            error!("Failed to write execution log for task #{}: {}", schedule.task_id, e);
        }

        info!(
            "Task #{} executed successfully. Email sent: {}",
            schedule.task_id, email_sent
        );
        ExecutionOutcome {
            schedule_id: schedule.schedule_id,
            task_id: schedule.task_id,
            committed: true,
            email_sent,
            result: ExecutionResult::Executed,
        }
    }

    /// Failure path. Each step is attempted regardless of the others.
    async fn fail(
        &self,
        schedule: &DueSchedule,
        now: Time,
        committed: bool,
        err: ExecutionError,
    ) -> ExecutionOutcome {
        error!("Failed to execute task #{}: {}", schedule.task_id, err);

        match self.store.update_status(schedule.task_id, TaskStatus::Failed).await {
            Ok(true) => {}
            Ok(false) => warn!("Task #{} vanished before it could be marked failed", schedule.task_id),
            Err(e) => error!("Failed to mark task #{} failed: {}", schedule.task_id, e),
        }

        let entry = LogEntry::new(
            schedule.task_id,
            LogAction::TaskExecutionFailed,
            Outcome::Failed,
            err.to_string(),
        )
        .with_schedule(schedule.schedule_id)
        .with_email_sent(false);
        if let Err(e) = self.store.append_log(&entry).await {
            error!("Failed to write failure log for task #{}: {}", schedule.task_id, e);
        }

        let data = TemplateData::task_executed(
            &schedule.owner_name,
            &schedule.title,
            schedule.description.clone(),
            now,
            Outcome::Failed,
        );
        let email_sent = self
            .notifier
            .send(NotificationKind::TaskExecuted, &schedule.owner_email, &data)
            .await;
        if !email_sent {
            error!("Failed to send failure notification for task #{}", schedule.task_id);
        }

        debug!(schedule = %schedule.schedule_id, committed, "execution failed");
        ExecutionOutcome {
            schedule_id: schedule.schedule_id,
            task_id: schedule.task_id,
            committed,
            email_sent,
            result: ExecutionResult::Failed {
                error: err.to_string(),
            },
        }
    }
}

/// What happened to one schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionOutcome {
    /// Schedule processed
    pub schedule_id: ScheduleId,
    /// Its task
    pub task_id: TaskId,
    /// Whether the schedule was marked executed
    pub committed: bool,
    /// Whether a notification (success or failure) went out
    pub email_sent: bool,
    /// Terminal result
    pub result: ExecutionResult,
}

impl ExecutionOutcome {
    /// Whether the task ended `completed`.
    pub fn is_success(&self) -> bool {
        matches!(self.result, ExecutionResult::Executed)
    }
}

/// Terminal state of one execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ExecutionResult {
    /// Task completed
    Executed,
    /// Task failed
    Failed {
        /// Error detail
        error: String,
    },
}

/// Result of a single execution cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// Instant the cycle treated as now
    pub started_at: Time,
    /// One entry per due schedule, in processing order
    pub outcomes: Vec<ExecutionOutcome>,
}

impl CycleReport {
    fn empty(started_at: Time) -> Self {
        Self {
            started_at,
            outcomes: Vec::new(),
        }
    }

    /// Number of due schedules found.
    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    /// Number that completed.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number that failed.
    pub fn failed(&self) -> usize {
        self.processed() - self.succeeded()
    }
}
