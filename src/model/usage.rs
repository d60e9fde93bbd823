use crate::model::registry::ModelConfig;
use crate::model::types::TokenUsage;
use serde::Serialize;
use std::sync::Mutex;

/// Cumulative model usage for a crawl run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub api_calls_count: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    #[serde(rename = "costUSD")]
    pub cost_usd: f64,
}

impl UsageStats {
    /// Adds one successful call
    ///
    /// Cost is computed from the model's price table; models without one add
    /// zero cost.
    pub fn record(&mut self, usage: Option<&TokenUsage>, model: &ModelConfig) {
        self.api_calls_count += 1;

        let Some(usage) = usage else {
            return;
        };

        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.total_tokens += usage.total_tokens;

        if let Some(pricing) = &model.pricing {
            self.cost_usd += pricing.cost(usage.prompt_tokens, usage.completion_tokens);
        }
    }
}

/// Shared, lock-guarded usage accumulator
///
/// The lock is only held for the duration of a single update or snapshot,
/// never across an `.await`.
#[derive(Debug, Default)]
pub struct UsageTracker {
    stats: Mutex<UsageStats>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one successful call
    pub fn record(&self, usage: Option<&TokenUsage>, model: &ModelConfig) {
        let mut stats = self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        stats.record(usage, model);
    }

    /// Returns a copy of the current totals
    pub fn snapshot(&self) -> UsageStats {
        self.stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::registry::model_config_by_name;
    use std::sync::Arc;

    fn usage(prompt: u64, completion: u64) -> TokenUsage {
        TokenUsage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
        }
    }

    #[test]
    fn test_accumulates_calls_and_cost() {
        let model = model_config_by_name("gpt-3.5-turbo").unwrap();
        let calls = [(1200, 300), (800, 50), (4000, 1000)];
        let mut stats = UsageStats::default();

        let mut expected_cost = 0.0;
        for (prompt, completion) in calls {
            stats.record(Some(&usage(prompt, completion)), model);
            expected_cost +=
                0.0005 * prompt as f64 / 1000.0 + 0.0015 * completion as f64 / 1000.0;
        }

        assert_eq!(stats.api_calls_count, 3);
        assert_eq!(stats.prompt_tokens, 6000);
        assert_eq!(stats.completion_tokens, 1350);
        assert_eq!(stats.total_tokens, 7350);
        assert!((stats.cost_usd - expected_cost).abs() < 1e-9);
    }

    #[test]
    fn test_unpriced_model_adds_zero_cost() {
        let model = model_config_by_name("text-davinci-003").unwrap();
        let mut stats = UsageStats::default();
        stats.record(Some(&usage(1000, 1000)), model);

        assert_eq!(stats.total_tokens, 2000);
        assert_eq!(stats.cost_usd, 0.0);
    }

    #[test]
    fn test_call_without_usage_still_counts() {
        let model = model_config_by_name("gpt-4").unwrap();
        let mut stats = UsageStats::default();
        stats.record(None, model);

        assert_eq!(stats.api_calls_count, 1);
        assert_eq!(stats.total_tokens, 0);
    }

    #[test]
    fn test_tracker_is_shared_across_threads() {
        let model = *model_config_by_name("gpt-4").unwrap();
        let tracker = Arc::new(UsageTracker::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        tracker.record(Some(&usage(10, 5)), &model);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = tracker.snapshot();
        assert_eq!(stats.api_calls_count, 800);
        assert_eq!(stats.prompt_tokens, 8000);
        assert!((stats.cost_usd - 800.0 * (0.03 * 0.01 + 0.06 * 0.005)).abs() < 1e-9);
    }

    #[test]
    fn test_serializes_camel_case() {
        let value = serde_json::to_value(UsageStats::default()).unwrap();
        assert!(value.get("apiCallsCount").is_some());
        assert!(value.get("costUSD").is_some());
    }
}
