//! Storage abstraction and implementations for the task scheduler.
//!
//! This crate provides trait-based stores for users, tasks, schedules and
//! the audit log, with an in-memory backend and a SQLite backend.

#![warn(missing_docs)]

pub mod trait_;
pub mod memory_storage;
#[cfg(feature = "sqlite")]
pub mod sqlite_storage;

pub use trait_::{LogStore, Result, ScheduleStore, Storage, StorageError, TaskStore, UserStore};
pub use memory_storage::MemoryStorage;
#[cfg(feature = "sqlite")]
pub use sqlite_storage::SqliteStorage;
