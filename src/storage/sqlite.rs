//! SQLite request queue
//!
//! This module provides a persistent, resumable implementation of the
//! [`RequestQueue`] trait.

use crate::crawler::CrawlTask;
use crate::state::TaskState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{AddOutcome, RequestQueue, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const TASK_COLUMNS: &str =
    "id, url, unique_key, depth, is_seed, retry_count, error_messages, admitted";

/// SQLite-backed request queue
///
/// The connection is guarded by a mutex that is never held across an
/// `.await`; every operation is a handful of short statements.
pub struct SqliteRequestQueue {
    conn: Mutex<Connection>,
}

impl SqliteRequestQueue {
    /// Opens or creates a queue database
    ///
    /// Tasks left in progress by an interrupted run are returned to the
    /// pending state and lose their admission, so the new run counts them
    /// against its own page budget.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteRequestQueue)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        let recovered = conn.execute(
            "UPDATE requests SET state = ?1, admitted = 0 WHERE state = ?2",
            params![
                TaskState::Pending.to_db_string(),
                TaskState::InProgress.to_db_string()
            ],
        )?;
        if recovered > 0 {
            tracing::info!("Recovered {} interrupted requests", recovered);
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory queue (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Database(format!("Queue lock poisoned: {}", e)))
    }

    /// Removes every queued request, for a fresh crawl
    pub fn clear(&self) -> StorageResult<()> {
        self.conn()?.execute("DELETE FROM requests", [])?;
        Ok(())
    }

    /// Number of requests in the given state
    pub fn count_by_state(&self, state: TaskState) -> StorageResult<u64> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM requests WHERE state = ?1",
            params![state.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Run Management =====

    /// Records the start of a crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    pub fn create_run(&self, config_hash: &str) -> StorageResult<i64> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Gets the run before the current one, if any
    pub fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let conn = self.conn()?;
        let run = conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok(RunRecord {
                        id: row.get(0)?,
                        started_at: row.get(1)?,
                        finished_at: row.get(2)?,
                        config_hash: row.get(3)?,
                        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                            .unwrap_or(RunStatus::Running),
                    })
                },
            )
            .optional()?;
        Ok(run)
    }

    /// Marks a run as finished with the given status
    pub fn finish_run(&self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn()?.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn set_state(&self, task: &CrawlTask, state: TaskState) -> StorageResult<()> {
        let messages = encode_messages(&task.error_messages)?;
        let handled_at = state.is_terminal().then(|| Utc::now().to_rfc3339());

        let updated = self.conn()?.execute(
            "UPDATE requests
             SET state = ?1, retry_count = ?2, error_messages = ?3, admitted = ?4, handled_at = ?5
             WHERE unique_key = ?6",
            params![
                state.to_db_string(),
                task.retry_count,
                messages,
                task.admitted,
                handled_at,
                task.unique_key
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::TaskNotFound(task.unique_key.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl RequestQueue for SqliteRequestQueue {
    async fn add(&self, task: CrawlTask) -> StorageResult<AddOutcome> {
        let messages = encode_messages(&task.error_messages)?;
        let inserted = self.conn()?.execute(
            "INSERT OR IGNORE INTO requests
             (id, url, unique_key, depth, is_seed, state, retry_count, error_messages, admitted, added_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                task.id,
                task.url,
                task.unique_key,
                task.depth,
                task.is_seed,
                TaskState::Pending.to_db_string(),
                task.retry_count,
                messages,
                task.admitted,
                Utc::now().to_rfc3339()
            ],
        )?;

        Ok(AddOutcome {
            was_already_present: inserted == 0,
        })
    }

    async fn fetch_next(&self) -> StorageResult<Option<CrawlTask>> {
        let conn = self.conn()?;
        let next = conn
            .query_row(
                &format!(
                    "SELECT {} FROM requests WHERE state = ?1 ORDER BY seq LIMIT 1",
                    TASK_COLUMNS
                ),
                params![TaskState::Pending.to_db_string()],
                task_from_row,
            )
            .optional()?;

        let Some(task) = next.transpose()? else {
            return Ok(None);
        };

        conn.execute(
            "UPDATE requests SET state = ?1 WHERE unique_key = ?2",
            params![TaskState::InProgress.to_db_string(), task.unique_key],
        )?;

        Ok(Some(task))
    }

    async fn reclaim(&self, task: &CrawlTask) -> StorageResult<()> {
        self.set_state(task, TaskState::Pending)
    }

    async fn mark_handled(&self, task: &CrawlTask) -> StorageResult<()> {
        self.set_state(task, TaskState::Handled)
    }

    async fn mark_failed(&self, task: &CrawlTask) -> StorageResult<()> {
        self.set_state(task, TaskState::Failed)
    }

    async fn is_finished(&self) -> StorageResult<bool> {
        let active: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM requests WHERE state IN (?1, ?2)",
            params![
                TaskState::Pending.to_db_string(),
                TaskState::InProgress.to_db_string()
            ],
            |row| row.get(0),
        )?;
        Ok(active == 0)
    }

    async fn handled_count(&self) -> StorageResult<u64> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM requests WHERE state IN (?1, ?2)",
            params![
                TaskState::Handled.to_db_string(),
                TaskState::Failed.to_db_string()
            ],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

fn encode_messages(messages: &[String]) -> StorageResult<String> {
    serde_json::to_string(messages).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Maps a row to a task; a corrupt message column becomes a storage error
fn task_from_row(row: &Row<'_>) -> rusqlite::Result<StorageResult<CrawlTask>> {
    let raw_messages: String = row.get(6)?;
    let error_messages = match serde_json::from_str::<Vec<String>>(&raw_messages) {
        Ok(messages) => messages,
        Err(e) => return Ok(Err(StorageError::Serialization(e.to_string()))),
    };

    Ok(Ok(CrawlTask {
        id: row.get(0)?,
        url: row.get(1)?,
        unique_key: row.get(2)?,
        depth: row.get(3)?,
        is_seed: row.get(4)?,
        retry_count: row.get(5)?,
        error_messages,
        admitted: row.get(7)?,
    }))
}
