//! Crawler module for page loading and processing
//!
//! This module contains the core crawling logic, including:
//! - The page driver abstraction and its plain-HTTP implementation
//! - HTML link extraction and selector checks
//! - Proxy selection and concurrency scaling
//! - The per-page pipeline and failure reporting
//! - Overall crawl coordination

mod coordinator;
mod driver;
mod failure;
mod fetcher;
mod parser;
mod pipeline;
mod proxy;
mod scheduler;
mod task;

pub use coordinator::{CrawlServices, Coordinator};
pub use driver::{
    is_blocked_status, NavigationContext, PageDriver, PageError, PageSession,
    BLOCKED_STATUS_CODES,
};
pub use failure::report_failed_task;
pub use fetcher::{build_http_client, HttpPageDriver};
pub use parser::{extract_links, inner_html, is_html_content_type, parse_selector};
pub use pipeline::{contains_skip_phrase, snapshot_key, PagePipeline, SKIP_PHRASES};
pub use proxy::{DomainProxyStats, ProxyChoice, ProxyManager, ProxyTier, TierStats};
pub use scheduler::{
    ScalingController, SCALE_DOWN_STEP_RATIO, SCALE_UP_STEP_RATIO, SCALING_INTERVAL,
};
pub use task::CrawlTask;

use crate::config::Settings;
use crate::output::RunSummary;
use crate::storage::RequestQueue;
use crate::GleanError;
use std::sync::Arc;

/// Runs a complete crawl with the standard services
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Build the HTTP page driver, the OpenAI model and the output stores
/// 2. Seed the queue with the start URLs
/// 3. Crawl until the queue is drained or the run is aborted
///
/// # Arguments
///
/// * `settings` - The resolved settings
/// * `queue` - The request queue, possibly holding a previous run's state
/// * `fresh` - Discard records of earlier runs from the dataset file
///
/// # Returns
///
/// * `Ok(RunSummary)` - Crawl completed
/// * `Err(GleanError)` - Crawl failed or was aborted
pub async fn crawl(
    settings: Settings,
    queue: Arc<dyn RequestQueue>,
    fresh: bool,
) -> Result<RunSummary, GleanError> {
    let services = CrawlServices::standard(&settings, queue, fresh).await?;
    Coordinator::new(Arc::new(settings), services).run().await
}
