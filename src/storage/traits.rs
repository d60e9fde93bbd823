//! Storage traits and error types
//!
//! This module defines the trait interfaces for the request queue and the
//! key-value store, and the associated error types.

use crate::crawler::CrawlTask;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result of adding a task to a [`RequestQueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    /// A task with the same unique key was queued before
    pub was_already_present: bool,
}

/// Deduplicating FIFO queue of crawl tasks
///
/// Implementations must be safe to share between workers.
#[async_trait]
pub trait RequestQueue: Send + Sync {
    /// Adds a task unless one with the same unique key was ever added
    async fn add(&self, task: CrawlTask) -> StorageResult<AddOutcome>;

    /// Takes the oldest pending task and marks it in progress
    async fn fetch_next(&self) -> StorageResult<Option<CrawlTask>>;

    /// Returns an in-progress task to the queue for another attempt
    ///
    /// The task's retry count, error messages and admission flag are
    /// persisted.
    async fn reclaim(&self, task: &CrawlTask) -> StorageResult<()>;

    /// Marks an in-progress task as done
    async fn mark_handled(&self, task: &CrawlTask) -> StorageResult<()>;

    /// Marks an in-progress task as failed for good
    async fn mark_failed(&self, task: &CrawlTask) -> StorageResult<()>;

    /// True when nothing is pending or in progress
    async fn is_finished(&self) -> StorageResult<bool>;

    /// Number of tasks that reached a terminal state
    async fn handled_count(&self) -> StorageResult<u64>;
}

/// Named binary values, e.g. page snapshots
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value
    async fn set_value(&self, key: &str, value: &[u8], content_type: &str) -> StorageResult<()>;

    /// Returns a URL at which the value stored under `key` can be read
    fn record_url(&self, key: &str) -> String;
}
