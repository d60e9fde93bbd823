//! Content preparation for LLM extraction
//!
//! Raw page markup goes through three steps before it reaches the model:
//!
//! 1. [`shrink_html`] removes noise and collapses whitespace
//! 2. [`to_page_format`] optionally converts the markup to markdown
//! 3. [`truncate_to_token_budget`] cuts the text to fit the model's window
//!
//! Nothing in this module can end a crawl run; every failure is local to
//! the page being prepared.

mod markdown;
mod shrink;
mod tokens;
mod truncate;

pub use markdown::{to_page_format, PageFormat};
pub use shrink::{shrink_html, validate_remove_selector, ShrinkOptions};
pub use tokens::TokenEstimator;
pub use truncate::{truncate_to_token_budget, CHUNK_CHARS};

use truncate::truncate_measured;

use thiserror::Error;

/// Smallest output reserve kept for models with a small context window
pub const MIN_OUTPUT_RESERVE: usize = 256;

/// Errors raised while preparing page content
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),

    #[error("Failed to serialize HTML: {0}")]
    Serialize(String),

    #[error("Failed to convert HTML to markdown: {0}")]
    Markdown(String),
}

/// Tokens held back for the model's answer
///
/// Ten percent of the context window, but never less than
/// [`MIN_OUTPUT_RESERVE`] unless that would eat more than half the window.
pub fn output_reserve(model_max_tokens: usize) -> usize {
    (model_max_tokens / 10).max(MIN_OUTPUT_RESERVE.min(model_max_tokens / 2))
}

/// Tokens available for page content once instructions and the answer are paid for
pub fn content_token_budget(model_max_tokens: usize, instruction_tokens: usize) -> usize {
    model_max_tokens
        .saturating_sub(output_reserve(model_max_tokens))
        .saturating_sub(instruction_tokens)
}

/// Page content ready to be sent to the model
#[derive(Debug, Clone)]
pub struct PreparedContent {
    /// The text to send
    pub text: String,

    /// Format of `text`
    pub format: PageFormat,

    /// Estimated tokens of `text`
    pub tokens: usize,

    /// Estimated tokens before truncation
    pub original_tokens: usize,

    /// Whether truncation removed anything
    pub truncated: bool,
}

/// Runs shrink, format conversion and truncation in order
#[derive(Debug, Clone)]
pub struct ContentProcessor {
    estimator: TokenEstimator,
    shrink: ShrinkOptions,
    format: PageFormat,
}

impl ContentProcessor {
    /// Creates a processor with the given shrink options and output format
    pub fn new(shrink: ShrinkOptions, format: PageFormat) -> Self {
        Self {
            estimator: TokenEstimator::new(),
            shrink,
            format,
        }
    }

    /// Returns the estimator used for budgeting
    pub fn estimator(&self) -> &TokenEstimator {
        &self.estimator
    }

    /// Returns the configured output format
    pub fn format(&self) -> PageFormat {
        self.format
    }

    /// Prepares `html` so that it fits in `max_tokens` estimated tokens
    ///
    /// # Arguments
    ///
    /// * `html` - Raw markup, either a full page or a fragment
    /// * `max_tokens` - Token budget for the content alone
    pub fn prepare(&self, html: &str, max_tokens: usize) -> Result<PreparedContent, ContentError> {
        let shrunk = shrink_html(html, &self.shrink)?;
        let formatted = to_page_format(&shrunk, self.format)?;
        let (text, original_tokens) = truncate_measured(&formatted, max_tokens, &self.estimator);
        let truncated = text.len() < formatted.len();
        let tokens = if truncated {
            self.estimator.estimate(text)
        } else {
            original_tokens
        };

        Ok(PreparedContent {
            text: text.to_string(),
            format: self.format,
            tokens,
            original_tokens,
            truncated,
        })
    }
}
