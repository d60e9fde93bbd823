//! Output module for crawl results and summaries
//!
//! This module handles:
//! - The record shapes written to the dataset
//! - Dataset sinks (JSON lines on disk, or memory)
//! - Run summaries and dataset statistics

mod dataset;
mod records;
pub mod stats;

pub use dataset::{read_jsonl, DatasetSink, JsonlDataset, MemoryDataset};
pub use records::{
    FailureDebug, FailureRecord, OutputRecord, ResultDebug, ResultRecord, SoftErrorRecord,
};
pub use stats::{load_statistics, print_statistics, print_summary, DatasetStatistics, RunSummary};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to format output: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
