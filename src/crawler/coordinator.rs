//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Seeding the request queue with the start URLs
//! - Running the worker pool at the concurrency the scaling controller allows
//! - Enforcing the per-task timeout
//! - Retrying failed attempts and reporting tasks that failed for good
//! - Aborting the run on run-fatal errors

use crate::config::Settings;
use crate::crawler::driver::{PageDriver, PageError};
use crate::crawler::failure::report_failed_task;
use crate::crawler::fetcher::HttpPageDriver;
use crate::crawler::pipeline::PagePipeline;
use crate::crawler::proxy::ProxyManager;
use crate::crawler::scheduler::{ScalingController, SCALING_INTERVAL};
use crate::crawler::task::CrawlTask;
use crate::model::{LanguageModel, ModelGateway, OpenAiModel, RetryPolicy};
use crate::output::{DatasetSink, JsonlDataset, RunSummary};
use crate::state::CrawlState;
use crate::storage::{FileKeyValueStore, KeyValueStore, RequestQueue};
use crate::GleanError;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

/// External capabilities a crawl run works with
pub struct CrawlServices {
    pub driver: Arc<dyn PageDriver>,
    pub model: Arc<dyn LanguageModel>,
    pub queue: Arc<dyn RequestQueue>,
    pub kv_store: Arc<dyn KeyValueStore>,
    pub dataset: Arc<dyn DatasetSink>,
}

impl CrawlServices {
    /// Builds the standard services for `settings`
    ///
    /// Pages are loaded over plain HTTP, the model is reached through the
    /// OpenAI API, snapshots go to `storage-dir` and records are appended
    /// to `dataset-path`.
    ///
    /// # Arguments
    ///
    /// * `settings` - The resolved settings
    /// * `queue` - The request queue; the caller owns its lifecycle
    /// * `fresh` - Discard records of earlier runs from the dataset file
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlServices)` - Ready-to-use services
    /// * `Err(GleanError)` - No API key, unusable storage paths, ...
    pub async fn standard(
        settings: &Settings,
        queue: Arc<dyn RequestQueue>,
        fresh: bool,
    ) -> Result<Self, GleanError> {
        let config = &settings.config;

        let driver = HttpPageDriver::new(
            &config.crawler.user_agent,
            Duration::from_secs(config.crawler.navigation_timeout_secs),
        )?;

        let mut model = match &config.model.api_key {
            Some(key) => OpenAiModel::new(settings.model, key.clone())?,
            None => OpenAiModel::from_env(settings.model)?,
        };
        if let Some(base_url) = &config.model.base_url {
            model = model.with_base_url(base_url.clone());
        }

        let kv_store = FileKeyValueStore::open(
            Path::new(&config.output.storage_dir),
            config.output.public_base_url.clone(),
        )?;
        let dataset_path = Path::new(&config.output.dataset_path);
        let dataset = if fresh {
            JsonlDataset::create(dataset_path).await?
        } else {
            JsonlDataset::open(dataset_path).await?
        };

        Ok(Self {
            driver: Arc::new(driver),
            model: Arc::new(model),
            queue,
            kv_store: Arc::new(kv_store),
            dataset: Arc::new(dataset),
        })
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    state: Arc<CrawlState>,
    pipeline: Arc<PagePipeline>,
    queue: Arc<dyn RequestQueue>,
    dataset: Arc<dyn DatasetSink>,
    scaling: Arc<ScalingController>,
    max_request_retries: u32,
    handler_timeout: Duration,
    scaling_interval: Duration,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `settings` - The resolved settings
    /// * `services` - Driver, model, queue and output stores
    pub fn new(settings: Arc<Settings>, services: CrawlServices) -> Self {
        Self::with_retry_policy(settings, services, RetryPolicy::default())
    }

    /// Like [`new`](Self::new), with a custom retry policy for model calls
    pub fn with_retry_policy(
        settings: Arc<Settings>,
        services: CrawlServices,
        retry: RetryPolicy,
    ) -> Self {
        let crawler = &settings.config.crawler;
        let max_request_retries = crawler.max_request_retries;
        let handler_timeout = Duration::from_secs(crawler.request_handler_timeout_secs);
        let scaling = Arc::new(ScalingController::new(
            crawler.min_concurrency,
            crawler.max_concurrency,
        ));
        let proxies = Arc::new(ProxyManager::new(&settings.config.proxy));

        let state = Arc::new(CrawlState::new(settings));
        let gateway = ModelGateway::new(services.model, state.usage().clone())
            .with_retry_policy(retry)
            .with_rate_limit_observer(scaling.clone());

        let pipeline = PagePipeline::new(
            state.clone(),
            services.driver,
            Arc::new(gateway),
            services.queue.clone(),
            services.kv_store,
            services.dataset.clone(),
            proxies,
            scaling.clone(),
        );

        Self {
            state,
            pipeline: Arc::new(pipeline),
            queue: services.queue,
            dataset: services.dataset,
            scaling,
            max_request_retries,
            handler_timeout,
            scaling_interval: SCALING_INTERVAL,
        }
    }

    /// Overrides how often concurrency is re-evaluated
    pub fn with_scaling_interval(mut self, interval: Duration) -> Self {
        self.scaling_interval = interval;
        self
    }

    pub fn state(&self) -> &Arc<CrawlState> {
        &self.state
    }

    /// Runs the main crawl loop
    ///
    /// This is the core crawling logic that:
    /// 1. Adds the start URLs to the queue
    /// 2. Starts tasks while the pool is below the allowed concurrency
    /// 3. Settles each finished task (handled, retried or failed)
    /// 4. Re-evaluates concurrency on every scaling tick
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - The queue was drained
    /// * `Err(GleanError::RunAborted)` - A run-fatal error stopped the crawl
    /// * `Err(GleanError)` - The queue or the dataset failed
    pub async fn run(&self) -> Result<RunSummary, GleanError> {
        self.seed().await?;

        let mut workers: JoinSet<(CrawlTask, Result<(), PageError>)> = JoinSet::new();
        let mut scaling_tick = tokio::time::interval(self.scaling_interval);
        scaling_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        scaling_tick.tick().await;

        let mut aborted: Option<String> = None;

        loop {
            while workers.len() < self.scaling.current() {
                let Some(task) = self.queue.fetch_next().await? else {
                    break;
                };
                self.spawn_task(&mut workers, task);
            }

            if workers.is_empty() {
                break;
            }

            tokio::select! {
                Some(joined) = workers.join_next() => {
                    let (task, outcome) = match joined {
                        Ok(finished) => finished,
                        Err(e) => {
                            // Panics are caught inside the task, so only cancellation lands here
                            tracing::error!("Worker task failed: {}", e);
                            continue;
                        }
                    };

                    if let Some(message) = self.settle(task, outcome).await? {
                        aborted = Some(message);
                        break;
                    }
                }
                _ = scaling_tick.tick() => {
                    self.scaling.tick();
                }
            }
        }

        if aborted.is_some() {
            workers.shutdown().await;
        }

        let summary = RunSummary::from_state(&self.state);
        summary.log();

        match aborted {
            Some(message) => Err(GleanError::RunAborted(message)),
            None => {
                if !self.queue.is_finished().await? {
                    tracing::warn!("Crawl ended with requests still in progress");
                }
                Ok(summary)
            }
        }
    }

    /// Adds the start URLs to the queue
    async fn seed(&self) -> Result<(), GleanError> {
        let mut added = 0usize;

        for url in &self.state.settings().config.crawl.start_urls {
            let task = match CrawlTask::seed(url) {
                Ok(task) => task,
                Err(e) => {
                    tracing::warn!("Skipping invalid start URL {}: {}", url, e);
                    continue;
                }
            };

            if !self.queue.add(task).await?.was_already_present {
                added += 1;
            }
        }

        tracing::info!(added, "Enqueued {} start URLs", added);
        Ok(())
    }

    /// Runs one attempt of `task` on the pool, bounded by the handler timeout
    ///
    /// A panicking handler fails the attempt like any other permanent error,
    /// so the task still gets its failure record and leaves the in-progress
    /// state.
    fn spawn_task(
        &self,
        workers: &mut JoinSet<(CrawlTask, Result<(), PageError>)>,
        mut task: CrawlTask,
    ) {
        let pipeline = self.pipeline.clone();
        let timeout = self.handler_timeout;

        tracing::debug!(url = %task.url, depth = task.depth, retry = task.retry_count, "Starting task");

        workers.spawn(async move {
            let snapshot = task.clone();
            let attempt = tokio::time::timeout(timeout, pipeline.handle(&mut task));

            match AssertUnwindSafe(attempt).catch_unwind().await {
                Ok(Ok(outcome)) => (task, outcome),
                Ok(Err(_)) => (task, Err(PageError::Timeout(timeout.as_secs()))),
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    tracing::error!(url = %snapshot.url, panic = %message, "Request handler panicked");
                    (
                        snapshot,
                        Err(PageError::Failed(format!("Request handler panicked: {}", message))),
                    )
                }
            }
        });
    }

    /// Records the outcome of an attempt in the queue
    ///
    /// Returns the abort message when the outcome must end the run.
    async fn settle(
        &self,
        mut task: CrawlTask,
        outcome: Result<(), PageError>,
    ) -> Result<Option<String>, GleanError> {
        match outcome {
            Ok(()) => {
                self.queue.mark_handled(&task).await?;
                Ok(None)
            }
            Err(PageError::RunFatal(message)) => {
                tracing::error!(url = %task.url, "{}", message);
                task.error_messages.push(message.clone());
                self.queue.mark_failed(&task).await?;
                Ok(Some(message))
            }
            Err(error) if error.is_retryable() && task.retry_count < self.max_request_retries => {
                task.record_failure(error.to_string());
                tracing::warn!(
                    url = %task.url,
                    attempt = task.retry_count,
                    error = %error,
                    "Page failed, retrying"
                );
                self.queue.reclaim(&task).await?;
                Ok(None)
            }
            Err(error) => {
                if !error.is_limit_reached() {
                    task.error_messages.push(error.to_string());
                }
                report_failed_task(&task, &error, self.dataset.as_ref(), self.state.counters())
                    .await?;

                if error.is_limit_reached() {
                    self.queue.mark_handled(&task).await?;
                } else {
                    self.queue.mark_failed(&task).await?;
                }
                Ok(None)
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
