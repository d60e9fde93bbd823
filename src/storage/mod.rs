//! Storage module for the request queue and snapshot store
//!
//! This module handles:
//! - The deduplicating request queue (SQLite for resumable crawls, in-memory
//!   for dry runs and tests)
//! - Crawl run tracking
//! - The key-value store receiving page snapshots

mod kv;
mod memory;
mod schema;
mod sqlite;
mod traits;

pub use kv::FileKeyValueStore;
pub use memory::MemoryRequestQueue;
pub use sqlite::SqliteRequestQueue;
pub use traits::{AddOutcome, KeyValueStore, RequestQueue, StorageError, StorageResult};

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Aborted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "aborted" => Some(Self::Aborted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
