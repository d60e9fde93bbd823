//! Static table of supported models

use serde::Serialize;

/// API style a model is served through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelInterface {
    /// Legacy text completions; no function calling
    Text,

    /// Chat completions; supports function-call mode
    Chat,
}

/// Price in USD per 1,000 tokens
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl ModelPricing {
    /// Cost of a single call
    pub fn cost(&self, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        self.input_per_1k * (prompt_tokens as f64 / 1000.0)
            + self.output_per_1k * (completion_tokens as f64 / 1000.0)
    }
}

/// A supported model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelConfig {
    /// Name used in configuration files
    pub name: &'static str,

    /// Name sent to the provider API
    pub api_name: &'static str,

    /// Context window in tokens (prompt plus answer)
    pub max_tokens: usize,

    pub interface: ModelInterface,

    /// Missing for models that are no longer billed per token
    pub pricing: Option<ModelPricing>,
}

impl ModelConfig {
    /// Whether the model can be asked for schema-constrained output
    pub fn supports_schema(&self) -> bool {
        self.interface == ModelInterface::Chat
    }
}

const fn priced(input_per_1k: f64, output_per_1k: f64) -> Option<ModelPricing> {
    Some(ModelPricing {
        input_per_1k,
        output_per_1k,
    })
}

/// All models the crawler can use
pub static MODELS: &[ModelConfig] = &[
    ModelConfig {
        name: "text-davinci-003",
        api_name: "text-davinci-003",
        max_tokens: 4097,
        interface: ModelInterface::Text,
        pricing: None,
    },
    ModelConfig {
        name: "text-davinci-002",
        api_name: "text-davinci-002",
        max_tokens: 4096,
        interface: ModelInterface::Text,
        pricing: None,
    },
    ModelConfig {
        name: "code-davinci-002",
        api_name: "code-davinci-002",
        max_tokens: 8001,
        interface: ModelInterface::Text,
        pricing: None,
    },
    ModelConfig {
        name: "gpt-3.5-turbo",
        api_name: "gpt-3.5-turbo",
        max_tokens: 4097,
        interface: ModelInterface::Chat,
        pricing: priced(0.0005, 0.0015),
    },
    ModelConfig {
        name: "gpt-3.5-turbo-16k",
        api_name: "gpt-3.5-turbo-16k",
        max_tokens: 16384,
        interface: ModelInterface::Chat,
        pricing: priced(0.003, 0.004),
    },
    ModelConfig {
        name: "gpt-4",
        api_name: "gpt-4",
        max_tokens: 8192,
        interface: ModelInterface::Chat,
        pricing: priced(0.03, 0.06),
    },
    ModelConfig {
        name: "gpt-4-32k",
        api_name: "gpt-4-32k",
        max_tokens: 32768,
        interface: ModelInterface::Chat,
        pricing: priced(0.06, 0.12),
    },
    ModelConfig {
        name: "gpt-4-turbo",
        api_name: "gpt-4-1106-preview",
        max_tokens: 128000,
        interface: ModelInterface::Chat,
        pricing: priced(0.01, 0.03),
    },
];

/// Looks up a model by its configuration name
///
/// # Examples
///
/// ```
/// use gleaner::model::model_config_by_name;
///
/// let model = model_config_by_name("gpt-4-turbo").unwrap();
/// assert_eq!(model.api_name, "gpt-4-1106-preview");
/// assert!(model_config_by_name("gpt-17").is_none());
/// ```
pub fn model_config_by_name(name: &str) -> Option<&'static ModelConfig> {
    MODELS.iter().find(|m| m.name == name)
}
