use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sampling settings sent with every call
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelSettings {
    pub temperature: f64,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
}

impl Default for ModelSettings {
    /// Temperature defaults to 0 so that repeated crawls give the same answers
    fn default() -> Self {
        Self {
            temperature: 0.0,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

/// A single extraction call
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// What the model should do with the page
    pub instructions: String,

    /// Prepared page content
    pub content: String,

    /// JSON schema for function-call mode
    pub schema: Option<Value>,

    /// Function description used alongside `schema`
    pub schema_description: Option<String>,

    pub settings: ModelSettings,
}

impl ExtractionRequest {
    /// The prompt text: instructions followed by the fenced content
    pub fn prompt(&self) -> String {
        format!("{}```{}```", self.instructions, self.content)
    }
}

/// Token counts reported by the provider for one call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// What the model returned
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionResult {
    /// Free-text answer, or the raw function arguments when no text was returned
    pub answer: Option<String>,

    /// Structured answer, when one could be parsed
    pub json_answer: Option<Value>,

    pub usage: Option<TokenUsage>,
}
