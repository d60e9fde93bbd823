//! Per-page processing
//!
//! [`PagePipeline::handle`] runs one attempt of one task:
//!
//! 1. Advisory budget check, navigation, authoritative admission
//! 2. One-time CSS selector validation against the first live page
//! 3. Dynamic content wait and cookie modal dismissal
//! 4. Link discovery
//! 5. Content extraction, preparation and optional snapshots
//! 6. The model call, skip-phrase filtering and the result record
//!
//! Errors returned from `handle` go to the coordinator, which decides
//! between retrying, reporting the failure and aborting the run.

use crate::content::{
    content_token_budget, validate_remove_selector, ContentProcessor, PreparedContent,
};
use crate::crawler::driver::{NavigationContext, PageDriver, PageError, PageSession};
use crate::crawler::proxy::{ProxyChoice, ProxyManager};
use crate::crawler::scheduler::ScalingController;
use crate::crawler::task::CrawlTask;
use crate::model::{ExtractionRequest, ModelError, ModelGateway};
use crate::output::{DatasetSink, ResultDebug, ResultRecord};
use crate::state::CrawlState;
use crate::storage::{KeyValueStore, RequestQueue};
use crate::url::{domain_of, matches_any};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Answers containing any of these are dropped from the output
pub const SKIP_PHRASES: [&str; 6] = [
    "skip this page",
    "skip this url",
    "skip the page",
    "skip the url",
    "skip url",
    "skip page",
];

/// Returns true if the model asked for the page to be left out
///
/// # Examples
///
/// ```
/// use gleaner::crawler::contains_skip_phrase;
///
/// assert!(contains_skip_phrase("Nothing relevant here. SKIP THIS PAGE."));
/// assert!(!contains_skip_phrase("The page lists three products."));
/// ```
pub fn contains_skip_phrase(answer: &str) -> bool {
    let lowered = answer.to_lowercase();
    SKIP_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

/// Key under which a page's artifacts are stored
///
/// Millisecond timestamp plus a short random suffix, so pages finishing in
/// the same millisecond do not overwrite each other.
pub fn snapshot_key() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().timestamp_millis(), &suffix[..8])
}

/// Stored artifact URLs for one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Snapshot {
    html_url: Option<String>,
    screenshot_url: Option<String>,
    sent_content_url: Option<String>,
}

/// Everything a page attempt needs, shared by all workers
pub struct PagePipeline {
    state: Arc<CrawlState>,
    driver: Arc<dyn PageDriver>,
    gateway: Arc<ModelGateway>,
    queue: Arc<dyn RequestQueue>,
    kv_store: Arc<dyn KeyValueStore>,
    dataset: Arc<dyn DatasetSink>,
    proxies: Arc<ProxyManager>,
    scaling: Arc<ScalingController>,
    processor: ContentProcessor,
}

impl PagePipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: Arc<CrawlState>,
        driver: Arc<dyn PageDriver>,
        gateway: Arc<ModelGateway>,
        queue: Arc<dyn RequestQueue>,
        kv_store: Arc<dyn KeyValueStore>,
        dataset: Arc<dyn DatasetSink>,
        proxies: Arc<ProxyManager>,
        scaling: Arc<ScalingController>,
    ) -> Self {
        let processor = state.settings().content_processor();
        Self {
            state,
            driver,
            gateway,
            queue,
            kv_store,
            dataset,
            proxies,
            scaling,
            processor,
        }
    }

    pub fn state(&self) -> &Arc<CrawlState> {
        &self.state
    }

    /// Runs one attempt of `task`
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The page is done, with or without a record
    /// * `Err(PageError::LimitReached)` - The page budget is used up
    /// * `Err(PageError::RunFatal)` - The crawl must stop
    /// * `Err(_)` - The attempt failed; see [`PageError::is_retryable`]
    pub async fn handle(&self, task: &mut CrawlTask) -> Result<(), PageError> {
        let settings = self.state.settings();
        let config = &settings.config;

        // An admitted task already holds its slot
        if !task.admitted {
            self.state.budget().check()?;
        }

        let session = self.navigate(task).await?;
        self.state.budget().admit(task)?;

        if self.state.claim_selector_validation() {
            self.validate_selectors(session.as_ref()).await?;
        }

        let url = session.url().to_string();
        tracing::info!(depth = task.depth, "Opening {}...", url);

        self.wait_for_dynamic_content(session.as_ref()).await;
        if let Err(e) = session.close_cookie_modals().await {
            tracing::debug!(url = %url, error = %e, "Failed to close cookie modals");
        }

        if let Some(link_selector) = &config.crawl.link_selector {
            if !settings.include_globs.is_empty() && settings.allows_links_from(task.depth) {
                self.enqueue_links(task, session.as_ref(), link_selector, &url)
                    .await?;
            }
        }

        if matches_any(&settings.skip_extraction_globs, &url) {
            tracing::info!(
                url = %url,
                "Skipping page from model processing because it matched `skip-extraction-globs`, crawling only."
            );
            self.state.counters().page_skipped();
            return Ok(());
        }

        let html = match &config.content.target_selector {
            Some(selector) => match session.query_inner_html(selector).await? {
                Some(html) => html,
                None => {
                    tracing::error!(
                        "Cannot find target selector {} on {}, skipping this page.",
                        selector,
                        url
                    );
                    self.state.counters().page_skipped();
                    return Ok(());
                }
            },
            None => session.content().await?,
        };

        let instruction_tokens = self
            .processor
            .estimator()
            .estimate(&config.model.instructions);
        let max_tokens = content_token_budget(settings.model.max_tokens, instruction_tokens);
        let prepared = self.processor.prepare(&html, max_tokens)?;

        let snapshot = if config.output.save_snapshots {
            self.save_snapshot(session.as_ref(), &prepared).await?
        } else {
            Snapshot::default()
        };

        if prepared.truncated {
            tracing::info!(
                original_tokens = prepared.original_tokens,
                tokens = prepared.tokens,
                max_tokens,
                "Processing page {} with truncated text using model instructions...",
                url
            );
            tracing::warn!(
                max_tokens_limit = settings.model.max_tokens,
                "Content was truncated for {} to match GPT maxTokens limit.",
                url
            );
        } else {
            tracing::info!(
                tokens = prepared.tokens,
                "Processing page {} with model instructions...",
                url
            );
        }

        let request = ExtractionRequest {
            instructions: config.model.instructions.clone(),
            content: prepared.text,
            schema: settings.schema.clone(),
            schema_description: settings
                .schema
                .as_ref()
                .map(|_| settings.schema_description.clone()),
            settings: settings.model_settings,
        };

        let result = match self.gateway.extract(&request).await {
            Ok(result) => result,
            Err(e) if e.is_run_fatal() => return Err(PageError::RunFatal(e.to_string())),
            Err(e @ ModelError::RetriesExhausted { .. }) => {
                return Err(PageError::Failed(e.to_string()))
            }
            Err(e) => {
                tracing::warn!(url = %url, "{}", e);
                self.state.counters().page_skipped();
                return Ok(());
            }
        };

        let answer = result.answer.unwrap_or_default();
        if contains_skip_phrase(&answer) {
            tracing::info!(
                answer = %answer,
                "Skipping page {} from output, the key word \"skip this page\" was found in answer.",
                url
            );
            self.state.counters().page_skipped();
            return Ok(());
        }

        let model_stats = self.gateway.usage().snapshot();
        tracing::info!(
            api_calls = model_stats.api_calls_count,
            total_tokens = model_stats.total_tokens,
            cost_usd = model_stats.cost_usd,
            "Page {} processed.",
            url
        );

        let record = ResultRecord {
            url,
            answer,
            json_answer: result.json_answer,
            html_snapshot_url: snapshot.html_url,
            screenshot_url: snapshot.screenshot_url,
            sent_content_url: snapshot.sent_content_url,
            debug: ResultDebug {
                model_name: settings.model.name.to_string(),
                model_stats,
            },
        };
        self.dataset.push(&record.into()).await?;
        self.state.counters().record_emitted();

        Ok(())
    }

    /// Runs the pre-navigation hooks and opens the page
    ///
    /// Initial cookies and the proxy are attached here, and the proxy
    /// outcome is fed back to the proxy manager.
    async fn navigate(&self, task: &CrawlTask) -> Result<Box<dyn PageSession>, PageError> {
        let config = &self.state.settings().config;

        let mut context =
            NavigationContext::new(Duration::from_secs(config.crawler.navigation_timeout_secs));
        context.cookies = config.crawl.initial_cookies.clone();

        let domain = domain_of(&task.url);
        let choice: Option<ProxyChoice> = domain
            .as_deref()
            .and_then(|domain| self.proxies.choose(domain, task.retry_count));
        context.proxy = choice.as_ref().map(|c| c.url.clone());

        let result = self.driver.open(&task.url, &context).await;

        if let (Some(domain), Some(choice)) = (&domain, &choice) {
            match &result {
                Ok(_) | Err(PageError::UserFacing(_)) => {
                    self.proxies.record(domain, choice.tier, true)
                }
                Err(PageError::Blocked { .. }) => self.proxies.record(domain, choice.tier, false),
                Err(_) => {}
            }
        }

        if let Err(PageError::Blocked { status: 429 }) = &result {
            self.scaling.report_rate_limit();
        }

        result
    }

    /// Checks the configured selectors against a live page
    ///
    /// The remove selector is applied during content preparation, so it is
    /// compiled by that engine rather than by the page session.
    async fn validate_selectors(&self, session: &dyn PageSession) -> Result<(), PageError> {
        let config = &self.state.settings().config;
        let invalid = |name: &str, selector: &str| {
            PageError::RunFatal(format!(
                "Invalid configuration: `{}` is not a valid CSS selector, got '{}'",
                name, selector
            ))
        };

        let page_selectors = [
            ("link-selector", &config.crawl.link_selector),
            ("target-selector", &config.content.target_selector),
        ];
        for (name, selector) in page_selectors {
            if let Some(selector) = selector {
                session
                    .validate_selector(selector)
                    .await
                    .map_err(|_| invalid(name, selector))?;
            }
        }

        if let Some(selector) = &config.content.remove_elements_css_selector {
            validate_remove_selector(selector)
                .map_err(|_| invalid("remove-elements-css-selector", selector))?;
        }

        Ok(())
    }

    /// Waits for the network to go idle, but no longer than the configured wait
    async fn wait_for_dynamic_content(&self, session: &dyn PageSession) {
        let wait = Duration::from_secs(self.state.settings().config.crawl.dynamic_content_wait_secs);

        tokio::select! {
            result = session.wait_for_network_idle(wait) => {
                if let Err(e) = result {
                    tracing::debug!(error = %e, "Network idle wait failed");
                }
            }
            _ = tokio::time::sleep(wait) => {}
        }
    }

    /// Enqueues links that match the include globs and no exclude glob
    async fn enqueue_links(
        &self,
        task: &CrawlTask,
        session: &dyn PageSession,
        link_selector: &str,
        url: &str,
    ) -> Result<(), PageError> {
        let settings = self.state.settings();
        let hrefs = session.link_hrefs(link_selector).await?;

        let mut enqueued = 0usize;
        let mut already_present = 0usize;

        for href in hrefs {
            if !matches_any(&settings.include_globs, &href)
                || matches_any(&settings.exclude_globs, &href)
            {
                continue;
            }

            let child = match task.child(&href) {
                Ok(child) => child,
                Err(e) => {
                    tracing::debug!(href = %href, error = %e, "Skipping unusable link");
                    continue;
                }
            };

            if self.queue.add(child).await?.was_already_present {
                already_present += 1;
            } else {
                enqueued += 1;
            }
        }

        tracing::info!(
            enqueued,
            already_present,
            depth = task.depth + 1,
            "Page {} enqueued {} new URLs.",
            url,
            enqueued
        );

        Ok(())
    }

    /// Stores the page markup, a screenshot if available, and the content sent to the model
    async fn save_snapshot(
        &self,
        session: &dyn PageSession,
        prepared: &PreparedContent,
    ) -> Result<Snapshot, PageError> {
        let key = snapshot_key();

        let html_key = format!("{}.html", key);
        let html = session.content().await?;
        self.kv_store
            .set_value(&html_key, html.as_bytes(), "text/html; charset=utf-8")
            .await?;

        let screenshot_url = match session.screenshot().await? {
            Some(jpeg) => {
                let screenshot_key = format!("{}.jpg", key);
                self.kv_store
                    .set_value(&screenshot_key, &jpeg, "image/jpeg")
                    .await?;
                Some(self.kv_store.record_url(&screenshot_key))
            }
            None => None,
        };

        let sent_content_key = format!("{}-sentContent.{}", key, prepared.format.extension());
        self.kv_store
            .set_value(
                &sent_content_key,
                prepared.text.as_bytes(),
                prepared.format.content_type(),
            )
            .await?;

        Ok(Snapshot {
            html_url: Some(self.kv_store.record_url(&html_key)),
            screenshot_url,
            sent_content_url: Some(self.kv_store.record_url(&sent_content_key)),
        })
    }
}
