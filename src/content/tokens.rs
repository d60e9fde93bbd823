//! Token estimation
//!
//! The estimator approximates a BPE tokenizer with a handful of character
//! classes. It never calls out to a real tokenizer, so it is cheap, pure and
//! identical across runs.

use once_cell::sync::Lazy;
use regex::Regex;

static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)(?P<word>[A-Za-z]+)|(?P<digits>[0-9]+)|(?P<newlines>\n+)|(?P<space>[^\S\n]+)|(?P<punct>[!-/:-@\[-`{-~]+)|(?P<other>.)",
    )
    .expect("Invalid token pattern regex")
});

/// Estimates how many tokens an LLM will bill for a text
///
/// | Class | Cost |
/// |-------|------|
/// | ASCII letter run | `ceil(len / 4)` |
/// | Digit run | `ceil(len / 3)` |
/// | Newline run | 1 |
/// | Other whitespace | 0 |
/// | ASCII punctuation run | `ceil(len / 2)` |
/// | Any other character (CJK, Devanagari, emoji, accented) | its UTF-8 length |
///
/// Byte-level BPE never needs more tokens than a text has bytes, so scripts
/// that the tokenizer splits into several tokens per character are never
/// underestimated.
///
/// Splitting a text never lowers the summed estimate of its parts, so the
/// estimate of a concatenation is at most the sum of the estimates of its
/// pieces.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenEstimator;

impl TokenEstimator {
    /// Creates a new estimator
    pub fn new() -> Self {
        Self
    }

    /// Returns the estimated token count of `text`
    ///
    /// # Examples
    ///
    /// ```
    /// use gleaner::content::TokenEstimator;
    ///
    /// let estimator = TokenEstimator::new();
    /// assert_eq!(estimator.estimate(""), 0);
    /// assert_eq!(estimator.estimate("hello world"), 4);
    /// ```
    pub fn estimate(&self, text: &str) -> usize {
        TOKEN_PATTERN
            .captures_iter(text)
            .map(|caps| {
                if let Some(m) = caps.name("word") {
                    div_ceil(m.as_str().len(), 4)
                } else if let Some(m) = caps.name("digits") {
                    div_ceil(m.as_str().len(), 3)
                } else if caps.name("newlines").is_some() {
                    1
                } else if caps.name("space").is_some() {
                    0
                } else if let Some(m) = caps.name("punct") {
                    div_ceil(m.as_str().len(), 2)
                } else {
                    caps.get(0).map_or(0, |m| m.as_str().len())
                }
            })
            .sum()
    }
}

fn div_ceil(value: usize, divisor: usize) -> usize {
    (value + divisor - 1) / divisor
}
