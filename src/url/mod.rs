//! URL handling for the crawler
//!
//! This module provides URL normalization, deduplication keys, domain
//! extraction and the glob matching used by link discovery.

mod domain;
mod matcher;
mod normalize;

pub use domain::{domain_of, extract_domain};
pub use matcher::{compile_globs, matches_any, UrlGlob};
pub use normalize::{normalize_url, unique_key};
