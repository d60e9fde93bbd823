//! Run summaries and dataset statistics
//!
//! This module provides the end-of-run summary and the statistics shown by
//! `--stats` for an existing dataset file.

use crate::model::UsageStats;
use crate::output::dataset::read_jsonl;
use crate::output::OutputResult;
use crate::state::CrawlState;
use serde_json::Value;
use std::path::Path;

/// What a finished crawl run did
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub model_name: String,
    pub pages_opened: u64,
    pub page_limit: Option<u64>,
    pub records: u64,
    pub soft_errors: u64,
    pub failures: u64,
    pub skipped: u64,
    pub usage: UsageStats,
}

impl RunSummary {
    /// Collects the summary from the run's shared state
    pub fn from_state(state: &CrawlState) -> Self {
        let counters = state.counters();
        Self {
            model_name: state.settings().model.name.to_string(),
            pages_opened: state.budget().opened(),
            page_limit: state.budget().limit(),
            records: counters.records(),
            soft_errors: counters.soft_errors(),
            failures: counters.failures(),
            skipped: counters.skipped(),
            usage: state.usage().snapshot(),
        }
    }

    /// Logs the summary as one structured event
    pub fn log(&self) {
        tracing::info!(
            pages_opened = self.pages_opened,
            records = self.records,
            soft_errors = self.soft_errors,
            failures = self.failures,
            skipped = self.skipped,
            api_calls = self.usage.api_calls_count,
            total_tokens = self.usage.total_tokens,
            cost_usd = self.usage.cost_usd,
            "Crawl finished"
        );
    }
}

/// Prints a run summary to stdout in a formatted manner
pub fn print_summary(summary: &RunSummary) {
    println!("=== Crawl Summary ===\n");

    match summary.page_limit {
        Some(limit) => println!("  Pages opened: {} / {}", summary.pages_opened, limit),
        None => println!("  Pages opened: {}", summary.pages_opened),
    }
    println!("  Records written: {}", summary.records);
    println!("  Error answers: {}", summary.soft_errors);
    println!("  Failed pages: {}", summary.failures);
    println!("  Pages without output: {}", summary.skipped);
    println!();

    println!("Model usage ({}):", summary.model_name);
    print_usage(&summary.usage);
}

fn print_usage(usage: &UsageStats) {
    println!("  API calls: {}", usage.api_calls_count);
    println!(
        "  Tokens: {} prompt + {} completion = {}",
        usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
    );
    println!("  Cost: ${:.4}", usage.cost_usd);
}

/// Statistics derived from a dataset file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetStatistics {
    pub total_records: u64,
    pub results: u64,
    pub json_answers: u64,
    pub soft_errors: u64,
    pub failures: u64,

    /// Usage snapshot of the last result record, if any
    pub usage: Option<UsageStats>,
}

/// Loads statistics from a JSON-lines dataset
///
/// # Arguments
///
/// * `path` - The dataset file written by a crawl
///
/// # Returns
///
/// * `Ok(DatasetStatistics)` - Successfully loaded statistics
/// * `Err(OutputError)` - The file could not be read or holds invalid JSON
pub fn load_statistics(path: &Path) -> OutputResult<DatasetStatistics> {
    let records = read_jsonl(path)?;
    Ok(statistics_from_records(&records))
}

fn statistics_from_records(records: &[Value]) -> DatasetStatistics {
    let mut stats = DatasetStatistics {
        total_records: records.len() as u64,
        ..Default::default()
    };

    for record in records {
        if record.get("#error").and_then(Value::as_bool) == Some(true) {
            stats.failures += 1;
            continue;
        }

        let Some(debug) = record.get("#debug") else {
            stats.soft_errors += 1;
            continue;
        };

        stats.results += 1;
        if record.get("jsonAnswer").is_some_and(|v| !v.is_null()) {
            stats.json_answers += 1;
        }
        if let Some(model_stats) = debug.get("modelStats") {
            stats.usage = Some(usage_from_value(model_stats));
        }
    }

    stats
}

fn usage_from_value(value: &Value) -> UsageStats {
    let count = |field: &str| value.get(field).and_then(Value::as_u64).unwrap_or(0);
    UsageStats {
        api_calls_count: count("apiCallsCount"),
        prompt_tokens: count("promptTokens"),
        completion_tokens: count("completionTokens"),
        total_tokens: count("totalTokens"),
        cost_usd: value.get("costUSD").and_then(Value::as_f64).unwrap_or(0.0),
    }
}

/// Prints dataset statistics to stdout in a formatted manner
pub fn print_statistics(stats: &DatasetStatistics) {
    println!("=== Dataset Statistics ===\n");

    println!("Records: {}", stats.total_records);
    println!("  Answers: {}", stats.results);
    println!("  With JSON answer: {}", stats.json_answers);
    println!("  Error answers: {}", stats.soft_errors);
    println!("  Failed pages: {}", stats.failures);
    println!();

    if let Some(usage) = &stats.usage {
        println!("Model usage:");
        print_usage(usage);
    }

    let success_rate = if stats.total_records > 0 {
        (stats.results as f64 / stats.total_records as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "\nSuccess Rate: {:.1}% ({} / {} records are answers)",
        success_rate, stats.results, stats.total_records
    );
}
