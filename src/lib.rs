//! Gleaner: an LLM-driven website crawler and extractor
//!
//! This crate crawls websites from a set of start URLs, prepares each page's
//! content for a large language model and records the model's answer,
//! staying within a page budget, a depth limit and the model's token window.

pub mod config;
pub mod content;
pub mod crawler;
pub mod model;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Gleaner operations
#[derive(Debug, Error)]
pub enum GleanError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Content error: {0}")]
    Content(#[from] content::ContentError),

    #[error("Model error: {0}")]
    Model(#[from] model::ModelError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A failure that ends the whole crawl, not just one page
    #[error("Crawl aborted: {0}")]
    RunAborted(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid URL glob: {0}")]
    InvalidPattern(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),

    #[error("Invalid URL glob: {0}")]
    InvalidGlob(String),
}

/// Result type alias for Gleaner operations
pub type Result<T> = std::result::Result<T, GleanError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{Config, Settings};
pub use crawler::Coordinator;
pub use state::{CrawlBudget, CrawlState, TaskState};
pub use url::{normalize_url, unique_key};
