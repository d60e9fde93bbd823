//! In-memory request queue

use crate::crawler::CrawlTask;
use crate::storage::traits::{AddOutcome, RequestQueue, StorageError, StorageResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct QueueInner {
    pending: VecDeque<CrawlTask>,
    in_progress: HashMap<String, CrawlTask>,
    seen: HashSet<String>,
    handled: u64,
}

/// Request queue that lives for a single process
///
/// Used for dry runs and tests; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryRequestQueue {
    inner: Mutex<QueueInner>,
}

impl MemoryRequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> StorageResult<MutexGuard<'_, QueueInner>> {
        self.inner
            .lock()
            .map_err(|e| StorageError::Database(format!("Queue lock poisoned: {}", e)))
    }

    fn finish(&self, task: &CrawlTask) -> StorageResult<()> {
        let mut inner = self.inner()?;
        inner
            .in_progress
            .remove(&task.unique_key)
            .ok_or_else(|| StorageError::TaskNotFound(task.unique_key.clone()))?;
        inner.handled += 1;
        Ok(())
    }
}

#[async_trait]
impl RequestQueue for MemoryRequestQueue {
    async fn add(&self, task: CrawlTask) -> StorageResult<AddOutcome> {
        let mut inner = self.inner()?;
        if !inner.seen.insert(task.unique_key.clone()) {
            return Ok(AddOutcome {
                was_already_present: true,
            });
        }

        inner.pending.push_back(task);
        Ok(AddOutcome {
            was_already_present: false,
        })
    }

    async fn fetch_next(&self) -> StorageResult<Option<CrawlTask>> {
        let mut inner = self.inner()?;
        let Some(task) = inner.pending.pop_front() else {
            return Ok(None);
        };

        inner
            .in_progress
            .insert(task.unique_key.clone(), task.clone());
        Ok(Some(task))
    }

    async fn reclaim(&self, task: &CrawlTask) -> StorageResult<()> {
        let mut inner = self.inner()?;
        inner
            .in_progress
            .remove(&task.unique_key)
            .ok_or_else(|| StorageError::TaskNotFound(task.unique_key.clone()))?;
        inner.pending.push_back(task.clone());
        Ok(())
    }

    async fn mark_handled(&self, task: &CrawlTask) -> StorageResult<()> {
        self.finish(task)
    }

    async fn mark_failed(&self, task: &CrawlTask) -> StorageResult<()> {
        self.finish(task)
    }

    async fn is_finished(&self) -> StorageResult<bool> {
        let inner = self.inner()?;
        Ok(inner.pending.is_empty() && inner.in_progress.is_empty())
    }

    async fn handled_count(&self) -> StorageResult<u64> {
        Ok(self.inner()?.handled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(path: &str) -> CrawlTask {
        CrawlTask::seed(&format!("https://example.com{}", path)).unwrap()
    }

    #[tokio::test]
    async fn test_dedup_and_fifo() {
        let queue = MemoryRequestQueue::new();
        assert!(!queue.add(task("/1")).await.unwrap().was_already_present);
        assert!(!queue.add(task("/2")).await.unwrap().was_already_present);
        assert!(queue.add(task("/1#frag")).await.unwrap().was_already_present);

        assert_eq!(
            queue.fetch_next().await.unwrap().unwrap().url,
            "https://example.com/1"
        );
        assert_eq!(
            queue.fetch_next().await.unwrap().unwrap().url,
            "https://example.com/2"
        );
        assert!(queue.fetch_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reclaim_and_finish() {
        let queue = MemoryRequestQueue::new();
        queue.add(task("/a")).await.unwrap();

        let mut fetched = queue.fetch_next().await.unwrap().unwrap();
        assert!(!queue.is_finished().await.unwrap());

        fetched.record_failure("timeout");
        queue.reclaim(&fetched).await.unwrap();

        let again = queue.fetch_next().await.unwrap().unwrap();
        assert_eq!(again.retry_count, 1);

        queue.mark_handled(&again).await.unwrap();
        assert!(queue.is_finished().await.unwrap());
        assert_eq!(queue.handled_count().await.unwrap(), 1);

        // Handled tasks are not queued again
        assert!(queue.add(task("/a")).await.unwrap().was_already_present);
    }

    #[tokio::test]
    async fn test_finishing_unknown_task_fails() {
        let queue = MemoryRequestQueue::new();
        assert!(queue.mark_failed(&task("/x")).await.is_err());
    }
}
