//! Configuration module for Gleaner
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and resolving them into runtime [`Settings`].
//!
//! # Example
//!
//! ```no_run
//! use gleaner::config::{load_config, Settings};
//! use std::path::Path;
//!
//! let config = load_config(Path::new("gleaner.toml")).unwrap();
//! let settings = Settings::resolve(config).unwrap();
//! println!("Using model {}", settings.model.name);
//! ```

mod parser;
mod settings;
mod types;
mod validation;

// Re-export types
pub use settings::Settings;
pub use types::{
    Config, ContentConfig, CookieEntry, CrawlConfig, CrawlerConfig, ModelOptions, OutputConfig,
    ProxyConfig, StringyNumber,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
