//! Handling of tasks that will not be retried

use crate::crawler::driver::PageError;
use crate::crawler::task::CrawlTask;
use crate::output::{DatasetSink, FailureDebug, FailureRecord, OutputResult, SoftErrorRecord};
use crate::state::RunCounters;

/// Writes the dataset record for a task that failed for good
///
/// # Behavior
///
/// | Error | Record |
/// |-------|--------|
/// | `LimitReached` | none, not logged as an error |
/// | `UserFacing` | `{url, answer: "ERROR: <message>"}` |
/// | anything else | `{"#error": true, "#debug": {...}}` |
///
/// # Arguments
///
/// * `task` - The task, with its retry count and error messages
/// * `error` - The error of the last attempt
/// * `dataset` - Where the record goes
/// * `counters` - Run counters to update
pub async fn report_failed_task(
    task: &CrawlTask,
    error: &PageError,
    dataset: &dyn DatasetSink,
    counters: &RunCounters,
) -> OutputResult<()> {
    if error.is_limit_reached() {
        tracing::debug!(url = %task.url, "Page limit reached, page not processed");
        return Ok(());
    }

    let message = error.to_string();
    let message = if message.is_empty() { "no error" } else { message.as_str() };
    tracing::error!(
        "Request {} failed and will not be retried anymore. Marking as failed.\nLast Error Message: {}",
        task.url,
        message
    );

    match error {
        PageError::UserFacing(_) => {
            dataset
                .push(&SoftErrorRecord::new(task.url.clone(), message).into())
                .await?;
            counters.soft_error_emitted();
        }
        _ => {
            let record = FailureRecord::new(FailureDebug {
                request_id: task.id.clone(),
                url: task.url.clone(),
                unique_key: task.unique_key.clone(),
                retry_count: task.retry_count,
                error_messages: task.error_messages.clone(),
            });
            dataset.push(&record.into()).await?;
            counters.failure_emitted();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::MemoryDataset;
    use crate::state::LimitReached;
    use serde_json::json;

    fn failed_task() -> CrawlTask {
        let mut task = CrawlTask::seed("https://example.com/flaky").unwrap();
        task.record_failure("Blocked. Response status code: 403");
        task.record_failure("Request handler timed out after 180 seconds");
        task
    }

    #[tokio::test]
    async fn test_limit_reached_is_silent() {
        let dataset = MemoryDataset::new();
        let counters = RunCounters::default();

        report_failed_task(&failed_task(), &PageError::from(LimitReached), &dataset, &counters)
            .await
            .unwrap();

        assert!(dataset.records().is_empty());
        assert_eq!(counters.failures(), 0);
    }

    #[tokio::test]
    async fn test_user_facing_error_becomes_answer() {
        let dataset = MemoryDataset::new();
        let counters = RunCounters::default();
        let error = PageError::UserFacing("Page https://example.com/flaky returned HTTP status 404".to_string());

        report_failed_task(&failed_task(), &error, &dataset, &counters)
            .await
            .unwrap();

        assert_eq!(
            dataset.records(),
            vec![json!({
                "url": "https://example.com/flaky",
                "answer": "ERROR: Page https://example.com/flaky returned HTTP status 404",
            })]
        );
        assert_eq!(counters.soft_errors(), 1);
    }

    #[tokio::test]
    async fn test_other_errors_become_failure_records() {
        let dataset = MemoryDataset::new();
        let counters = RunCounters::default();
        let task = failed_task();

        report_failed_task(&task, &PageError::Timeout(180), &dataset, &counters)
            .await
            .unwrap();

        let records = dataset.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["#error"], json!(true));
        assert_eq!(records[0]["#debug"]["requestId"], json!(task.id));
        assert_eq!(records[0]["#debug"]["uniqueKey"], json!("https://example.com/flaky"));
        assert_eq!(records[0]["#debug"]["retryCount"], json!(2));
        assert_eq!(
            records[0]["#debug"]["errorMessages"][1],
            json!("Request handler timed out after 180 seconds")
        );
        assert_eq!(counters.failures(), 1);
    }
}
