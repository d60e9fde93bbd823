//! Retrying, usage-accounting front for a language model

use crate::model::error::{ModelError, ModelErrorKind};
use crate::model::registry::ModelConfig;
use crate::model::types::{ExtractionRequest, ExtractionResult};
use crate::model::usage::UsageTracker;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A single-attempt connection to an LLM provider
///
/// Implementations classify their own failures into [`ModelError`]; retries
/// and usage accounting belong to [`ModelGateway`].
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// The model this provider serves
    fn config(&self) -> &ModelConfig;

    /// Sends one request and returns the answer or a classified failure
    async fn complete(&self, request: &ExtractionRequest) -> Result<ExtractionResult, ModelError>;
}

/// Receives rate-limit signals so concurrency can be reduced
pub trait RateLimitObserver: Send + Sync {
    /// Called each time the provider answers with a rate limit
    fn on_rate_limited(&self, attempt: u32);
}

/// How often and how patiently a request is retried
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,

    /// Delay unit; attempt `n` waits `base_delay * n²`
    pub base_delay: Duration,

    /// Upper bound on a single wait
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Wait after the given failed attempt (1-based)
    ///
    /// # Examples
    ///
    /// ```
    /// use gleaner::model::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.backoff(1), Duration::from_millis(500));
    /// assert_eq!(policy.backoff(3), Duration::from_millis(4500));
    /// assert_eq!(policy.backoff(8), Duration::from_secs(30));
    /// ```
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = attempt.saturating_mul(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Wraps one provider with retries, backoff and usage accounting
pub struct ModelGateway {
    model: Arc<dyn LanguageModel>,
    retry: RetryPolicy,
    usage: Arc<UsageTracker>,
    rate_limit_observer: Option<Arc<dyn RateLimitObserver>>,
}

impl ModelGateway {
    /// Creates a gateway that records usage into `usage`
    pub fn new(model: Arc<dyn LanguageModel>, usage: Arc<UsageTracker>) -> Self {
        Self {
            model,
            retry: RetryPolicy::default(),
            usage,
            rate_limit_observer: None,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Registers the component that should hear about rate limits
    pub fn with_rate_limit_observer(mut self, observer: Arc<dyn RateLimitObserver>) -> Self {
        self.rate_limit_observer = Some(observer);
        self
    }

    pub fn model_config(&self) -> &ModelConfig {
        self.model.config()
    }

    pub fn usage(&self) -> &Arc<UsageTracker> {
        &self.usage
    }

    /// Runs an extraction, retrying transient failures
    ///
    /// # Returns
    ///
    /// * `Ok(ExtractionResult)` - The model answered; usage has been recorded
    /// * `Err(ModelError::Provider)` - A non-retryable provider failure
    /// * `Err(ModelError::RetriesExhausted)` - Every attempt hit a retryable failure
    pub async fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> Result<ExtractionResult, ModelError> {
        let mut last_message = String::new();

        for attempt in 1..=self.retry.max_attempts {
            match self.model.complete(request).await {
                Ok(result) => {
                    self.usage.record(result.usage.as_ref(), self.model.config());
                    return Ok(result);
                }
                Err(error) if error.is_retryable() => {
                    tracing::warn!(
                        attempt,
                        error = %error,
                        "OpenAI API error, retrying..."
                    );

                    if error.kind() == Some(ModelErrorKind::RateLimited) {
                        if let Some(observer) = &self.rate_limit_observer {
                            observer.on_rate_limited(attempt);
                        }
                    }

                    last_message = error.to_string();
                    if attempt < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.backoff(attempt)).await;
                    }
                }
                Err(error) => return Err(error),
            }
        }

        Err(ModelError::RetriesExhausted {
            attempts: self.retry.max_attempts,
            last_message,
        })
    }
}
