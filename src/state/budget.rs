//! Page budget shared by all tasks of a run

use crate::crawler::CrawlTask;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// The page budget is exhausted
///
/// This is a normal end-of-crawl signal, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Skipping this page, page limit reached")]
pub struct LimitReached;

/// Outcome of a successful [`CrawlBudget::admit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// True when this call counted the task; false if it was already admitted
    pub first: bool,
}

/// Race-safe count of pages opened against an optional limit
#[derive(Debug)]
pub struct CrawlBudget {
    opened: AtomicU64,
    limit: Option<u64>,
}

impl CrawlBudget {
    /// Creates a budget; `None` means unlimited
    pub fn new(limit: Option<u64>) -> Self {
        Self {
            opened: AtomicU64::new(0),
            limit,
        }
    }

    /// Advisory check done before navigating
    ///
    /// Another task may take the last slot between this check and
    /// [`admit`](Self::admit); only `admit` is authoritative.
    pub fn check(&self) -> Result<(), LimitReached> {
        match self.limit {
            Some(limit) if self.opened.load(Ordering::SeqCst) >= limit => Err(LimitReached),
            _ => Ok(()),
        }
    }

    /// Counts the task against the budget, at most once per task
    ///
    /// # Returns
    ///
    /// * `Ok(Admission { first: true })` - The task took a slot
    /// * `Ok(Admission { first: false })` - The task already held a slot (a retry)
    /// * `Err(LimitReached)` - No slot is left
    ///
    /// # Examples
    ///
    /// ```
    /// use gleaner::crawler::CrawlTask;
    /// use gleaner::state::CrawlBudget;
    ///
    /// let budget = CrawlBudget::new(Some(1));
    /// let mut first = CrawlTask::seed("https://example.com/a").unwrap();
    /// let mut second = CrawlTask::seed("https://example.com/b").unwrap();
    ///
    /// assert!(budget.admit(&mut first).unwrap().first);
    /// assert!(!budget.admit(&mut first).unwrap().first);
    /// assert!(budget.admit(&mut second).is_err());
    /// assert_eq!(budget.opened(), 1);
    /// ```
    pub fn admit(&self, task: &mut CrawlTask) -> Result<Admission, LimitReached> {
        if task.admitted {
            return Ok(Admission { first: false });
        }

        match self.limit {
            None => {
                self.opened.fetch_add(1, Ordering::SeqCst);
            }
            Some(limit) => {
                self.opened
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |opened| {
                        (opened < limit).then_some(opened + 1)
                    })
                    .map_err(|_| LimitReached)?;
            }
        }

        task.admitted = true;
        Ok(Admission { first: true })
    }

    /// Pages opened so far
    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Whether no further task can be admitted
    pub fn is_exhausted(&self) -> bool {
        self.check().is_err()
    }
}
