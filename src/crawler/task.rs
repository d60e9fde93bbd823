//! Crawl task definition

use crate::url::{normalize_url, unique_key};
use crate::UrlError;
use uuid::Uuid;

/// One URL to visit, as held by the request queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    /// Correlation id, stable across retries
    pub id: String,

    /// Normalized URL to navigate to
    pub url: String,

    /// Deduplication key, see [`unique_key`]
    pub unique_key: String,

    /// Hops from a seed URL
    pub depth: u32,

    pub is_seed: bool,

    /// Attempts that failed so far
    pub retry_count: u32,

    /// One message per failed attempt
    pub error_messages: Vec<String>,

    /// Set once the task has been counted against the page budget
    pub admitted: bool,
}

impl CrawlTask {
    /// Creates a depth-0 task for a start URL
    ///
    /// # Examples
    ///
    /// ```
    /// use gleaner::crawler::CrawlTask;
    ///
    /// let task = CrawlTask::seed("https://Example.com/docs/#top").unwrap();
    /// assert_eq!(task.url, "https://example.com/docs/");
    /// assert_eq!(task.unique_key, "https://example.com/docs");
    /// assert_eq!(task.depth, 0);
    /// assert!(task.is_seed);
    /// ```
    pub fn seed(url: &str) -> Result<Self, UrlError> {
        Self::new(url, 0, true)
    }

    /// Creates a task for a link found on this task's page
    pub fn child(&self, url: &str) -> Result<Self, UrlError> {
        Self::new(url, self.depth + 1, false)
    }

    fn new(url: &str, depth: u32, is_seed: bool) -> Result<Self, UrlError> {
        let normalized = normalize_url(url)?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            unique_key: unique_key(normalized.as_str())?,
            url: normalized.to_string(),
            depth,
            is_seed,
            retry_count: 0,
            error_messages: Vec::new(),
            admitted: false,
        })
    }

    /// Records a failed attempt
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.retry_count += 1;
        self.error_messages.push(message.into());
    }

    /// The most recent failure message
    pub fn last_error(&self) -> Option<&str> {
        self.error_messages.last().map(String::as_str)
    }
}
