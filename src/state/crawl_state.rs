use crate::config::Settings;
use crate::model::UsageTracker;
use crate::state::budget::CrawlBudget;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Counts of what a run produced
#[derive(Debug, Default)]
pub struct RunCounters {
    records: AtomicU64,
    soft_errors: AtomicU64,
    failures: AtomicU64,
    skipped: AtomicU64,
}

impl RunCounters {
    /// A result record was written
    pub fn record_emitted(&self) {
        self.records.fetch_add(1, Ordering::Relaxed);
    }

    /// A `ERROR: ...` answer was written for a user-facing failure
    pub fn soft_error_emitted(&self) {
        self.soft_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// A page failed and an `#error` record was written
    pub fn failure_emitted(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A page finished without a record (skip phrase, missing target, ...)
    pub fn page_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn records(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }

    pub fn soft_errors(&self) -> u64 {
        self.soft_errors.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

/// State shared by every task of one crawl run
///
/// Created once per run and handed to tasks as `Arc<CrawlState>`.
#[derive(Debug)]
pub struct CrawlState {
    settings: Arc<Settings>,
    budget: CrawlBudget,
    usage: Arc<UsageTracker>,
    counters: RunCounters,
    selectors_validated: AtomicBool,
}

impl CrawlState {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self {
            budget: CrawlBudget::new(settings.max_pages),
            settings,
            usage: Arc::new(UsageTracker::new()),
            counters: RunCounters::default(),
            selectors_validated: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn budget(&self) -> &CrawlBudget {
        &self.budget
    }

    pub fn usage(&self) -> &Arc<UsageTracker> {
        &self.usage
    }

    pub fn counters(&self) -> &RunCounters {
        &self.counters
    }

    /// Returns true exactly once per run, for the task that should validate
    /// the configured CSS selectors against a live page
    pub fn claim_selector_validation(&self) -> bool {
        self.selectors_validated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}
