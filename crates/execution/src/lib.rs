//! Execution layer - the engine that runs due schedules, the poller that
//! drives it, and the task service around it.

#![warn(missing_docs)]

pub mod cron;
pub mod engine;
pub mod poller;
pub mod service;

pub use cron::{CronError, CronExpression};
pub use engine::{
    CycleReport, EngineConfig, ExecutionEngine, ExecutionError, ExecutionOutcome, ExecutionResult,
};
pub use poller::{PollSchedule, Poller, PollerStatus};
pub use service::{ServiceError, TaskDetail, TaskLogs, TaskService, DEFAULT_LOG_LIMIT};
