//! Provider error classification

use thiserror::Error;

/// Message shown when the provider rejects a prompt as repetitive
pub const REPETITIVE_PROMPT_ERROR_MESSAGE: &str = "OpenAI has rejected a page prompt because it \
contains repetitive patterns. This usually happens when the website you are trying to scrape has \
some repetitive content. Please try to remove the repetitive content via the \
`remove-elements-css-selector` option. Skipping model processing for this page!";

/// Suffix of the provider message for an oversized function description
pub const DESCRIPTION_LENGTH_ERROR: &str = "is too long - 'functions.0.description'";

/// Message shown when the schema description is too long
pub const DESCRIPTION_LENGTH_ERROR_MESSAGE: &str = "Schema function description is too long, \
please shorten it to a maximum of 1280 characters.\n\t- TIP: You can use `instructions` \
separately from `schema-description` to provide more context.";

/// Provider error code for an exhausted billing quota
const INSUFFICIENT_QUOTA_CODE: &str = "insufficient_quota";

/// Closed set of provider failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelErrorKind {
    /// 5xx or a transport failure
    ServerError,

    /// 429 without a quota code
    RateLimited,

    /// Billing quota exhausted
    QuotaExceeded,

    /// Prompt rejected for repetitive content
    RepetitiveContent,

    /// Function description longer than the provider allows
    OversizedSchema,

    /// Anything else
    Unknown,
}

impl ModelErrorKind {
    /// Whether the gateway should try the same request again
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServerError | Self::RateLimited)
    }

    /// Whether the failure must end the whole crawl run
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            Self::QuotaExceeded | Self::OversizedSchema | Self::Unknown
        )
    }
}

/// Errors returned by the model gateway
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("OpenAI API error: {message}")]
    Provider {
        kind: ModelErrorKind,
        message: String,
        status: Option<u16>,
    },

    #[error("OpenAI API failed after {attempts} retries (last error: {last_message})")]
    RetriesExhausted { attempts: u32, last_message: String },

    #[error("Model configuration error: {0}")]
    Config(String),
}

impl ModelError {
    /// Builds a provider error of the given kind
    pub fn provider(kind: ModelErrorKind, message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Provider {
            kind,
            message: message.into(),
            status,
        }
    }

    /// Returns the provider error class, if this is a provider error
    pub fn kind(&self) -> Option<ModelErrorKind> {
        match self {
            Self::Provider { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().map(|k| k.is_retryable()).unwrap_or(false)
    }

    /// Whether the failure must end the whole crawl run
    pub fn is_run_fatal(&self) -> bool {
        match self {
            Self::Provider { kind, .. } => kind.is_run_fatal(),
            Self::Config(_) => true,
            Self::RetriesExhausted { .. } => false,
        }
    }
}

/// Classifies a failed provider call
///
/// # Arguments
///
/// * `status` - HTTP status, `None` when the request never got a response
/// * `code` - Provider error code or type from the error body, if any
/// * `message` - Provider error message
///
/// # Classification
///
/// | Condition | Kind |
/// |-----------|------|
/// | code `insufficient_quota` or HTTP 402 | QuotaExceeded |
/// | no response | ServerError |
/// | HTTP 5xx | ServerError |
/// | HTTP 429 | RateLimited |
/// | HTTP 400 mentioning repetitive patterns | RepetitiveContent |
/// | HTTP 400 about the function description length | OversizedSchema |
/// | anything else | Unknown |
pub fn classify_failure(status: Option<u16>, code: Option<&str>, message: &str) -> ModelError {
    if code == Some(INSUFFICIENT_QUOTA_CODE) || status == Some(402) {
        return ModelError::provider(ModelErrorKind::QuotaExceeded, message, status);
    }

    let kind = match status {
        None => ModelErrorKind::ServerError,
        Some(500..=599) => ModelErrorKind::ServerError,
        Some(429) => ModelErrorKind::RateLimited,
        Some(400) if message.contains("repetitive patterns") => {
            return ModelError::provider(
                ModelErrorKind::RepetitiveContent,
                REPETITIVE_PROMPT_ERROR_MESSAGE,
                status,
            );
        }
        Some(400) if message.trim_end().ends_with(DESCRIPTION_LENGTH_ERROR) => {
            return ModelError::provider(
                ModelErrorKind::OversizedSchema,
                DESCRIPTION_LENGTH_ERROR_MESSAGE,
                status,
            );
        }
        Some(_) => ModelErrorKind::Unknown,
    };

    ModelError::provider(kind, message, status)
}
