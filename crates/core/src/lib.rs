//! Task scheduler core data models.
//!
//! This crate defines the users, tasks, schedules and audit log entries
//! shared by the stores, the notification gateway and the execution engine.

#![warn(missing_docs)]

// Core identities
mod id;
mod error;

// Domain models
mod user;
mod task;
mod schedule;
mod log;

// Re-exports
pub use id::*;
pub use error::CoreError;

pub use user::User;
pub use task::{Task, TaskStatus, TaskUpdate, TaskFilter};
pub use schedule::{Schedule, DueSchedule};
pub use log::{LogEntry, LogAction, Outcome, LogStats};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
