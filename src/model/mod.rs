//! LLM access: model registry, provider client and the retrying gateway
//!
//! The crawler only talks to [`ModelGateway`]. The gateway owns retries,
//! backoff and usage accounting; a [`LanguageModel`] implementation such as
//! [`OpenAiModel`] performs exactly one provider call per attempt.

mod error;
mod gateway;
mod json;
mod openai;
mod registry;
mod types;
mod usage;

pub use error::{
    classify_failure, ModelError, ModelErrorKind, DESCRIPTION_LENGTH_ERROR_MESSAGE,
    REPETITIVE_PROMPT_ERROR_MESSAGE,
};
pub use gateway::{LanguageModel, ModelGateway, RateLimitObserver, RetryPolicy};
pub use json::try_parse_json_from_str;
pub use openai::{OpenAiModel, API_KEY_ENV, DEFAULT_BASE_URL, EXTRACT_FUNCTION_NAME};
pub use registry::{model_config_by_name, ModelConfig, ModelInterface, ModelPricing, MODELS};
pub use types::{ExtractionRequest, ExtractionResult, ModelSettings, TokenUsage};
pub use usage::{UsageStats, UsageTracker};

#[cfg(test)]
pub(crate) use gateway::tests::ScriptedModel;
