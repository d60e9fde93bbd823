//! Dataset sinks receiving one record per processed page

use crate::output::records::OutputRecord;
use crate::output::{OutputError, OutputResult};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Destination for output records
#[async_trait]
pub trait DatasetSink: Send + Sync {
    /// Appends one record
    async fn push(&self, record: &OutputRecord) -> OutputResult<()>;
}

/// Appends records to a JSON-lines file
pub struct JsonlDataset {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlDataset {
    /// Opens `path` for appending, creating it and its directory if needed
    pub async fn open(path: &Path) -> OutputResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// Opens `path` after discarding any previous content
    pub async fn create(path: &Path) -> OutputResult<Self> {
        if tokio::fs::try_exists(path).await? {
            tokio::fs::remove_file(path).await?;
        }
        Self::open(path).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DatasetSink for JsonlDataset {
    async fn push(&self, record: &OutputRecord) -> OutputResult<()> {
        let mut line =
            serde_json::to_string(record).map_err(|e| OutputError::Format(e.to_string()))?;
        line.push('\n');

        // Whole lines only, so concurrent pushes never interleave
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Keeps records in memory, as JSON values
#[derive(Debug, Default)]
pub struct MemoryDataset {
    records: std::sync::Mutex<Vec<Value>>,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every record pushed so far
    pub fn records(&self) -> Vec<Value> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl DatasetSink for MemoryDataset {
    async fn push(&self, record: &OutputRecord) -> OutputResult<()> {
        let value = serde_json::to_value(record).map_err(|e| OutputError::Format(e.to_string()))?;
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(value);
        Ok(())
    }
}

/// Reads every record of a JSON-lines dataset file
pub fn read_jsonl(path: &Path) -> OutputResult<Vec<Value>> {
    let content = std::fs::read_to_string(path)?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(|e| OutputError::Format(e.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::records::SoftErrorRecord;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn soft_error(n: usize) -> OutputRecord {
        SoftErrorRecord::new(format!("https://example.com/{}", n), "gone").into()
    }

    #[tokio::test]
    async fn test_jsonl_appends_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("dataset.jsonl");

        let dataset = JsonlDataset::open(&path).await.unwrap();
        dataset.push(&soft_error(1)).await.unwrap();
        dataset.push(&soft_error(2)).await.unwrap();

        let records = read_jsonl(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1]["url"], "https://example.com/2");
        assert_eq!(records[1]["answer"], "ERROR: gone");
    }

    #[tokio::test]
    async fn test_create_truncates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dataset.jsonl");

        let dataset = JsonlDataset::open(&path).await.unwrap();
        dataset.push(&soft_error(1)).await.unwrap();
        drop(dataset);

        let dataset = JsonlDataset::create(&path).await.unwrap();
        dataset.push(&soft_error(2)).await.unwrap();

        let records = read_jsonl(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["url"], "https://example.com/2");
    }

    #[tokio::test]
    async fn test_concurrent_pushes_keep_lines_whole() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dataset.jsonl");
        let dataset = Arc::new(JsonlDataset::open(&path).await.unwrap());

        let mut handles = Vec::new();
        for n in 0..50 {
            let dataset = dataset.clone();
            handles.push(tokio::spawn(async move {
                dataset.push(&soft_error(n)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(read_jsonl(&path).unwrap().len(), 50);
    }

    #[tokio::test]
    async fn test_memory_dataset() {
        let dataset = MemoryDataset::new();
        dataset.push(&soft_error(7)).await.unwrap();
        assert_eq!(dataset.records()[0]["url"], "https://example.com/7");
    }
}
