//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlBudget`: Race-safe count of pages opened against the page limit
//! - `CrawlState`: Per-run state shared by every task
//! - `TaskState`: Lifecycle of a task in the persistent request queue

mod budget;
mod crawl_state;
mod task_state;

// Re-export main types
pub use budget::{Admission, CrawlBudget, LimitReached};
pub use crawl_state::{CrawlState, RunCounters};
pub use task_state::TaskState;

#[cfg(test)]
pub(crate) use crawl_state::tests::test_settings;
