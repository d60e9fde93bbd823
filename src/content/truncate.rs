use crate::content::tokens::TokenEstimator;

/// Number of characters per truncation chunk
pub const CHUNK_CHARS: usize = 100;

/// Cuts `text` down to at most `max_tokens` estimated tokens
///
/// Texts that fit the budget are returned unchanged, however long they are.
/// Otherwise the text is split into [`CHUNK_CHARS`]-character chunks that
/// are accepted greedily while the running sum of their estimates stays
/// within the budget.
///
/// The result is always a prefix of `text`, and ends on a chunk boundary
/// whenever it is shorter than `text`.
///
/// # Examples
///
/// ```
/// use gleaner::content::{truncate_to_token_budget, TokenEstimator};
///
/// let estimator = TokenEstimator::new();
/// let text = "word ".repeat(1_000);
/// let cut = truncate_to_token_budget(&text, 50, &estimator);
/// assert!(text.starts_with(cut));
/// assert!(estimator.estimate(cut) <= 50);
/// ```
pub fn truncate_to_token_budget<'a>(
    text: &'a str,
    max_tokens: usize,
    estimator: &TokenEstimator,
) -> &'a str {
    truncate_measured(text, max_tokens, estimator).0
}

/// Truncates like [`truncate_to_token_budget`] and also returns the estimate
/// of the whole `text`, so callers need not estimate it a second time
pub(crate) fn truncate_measured<'a>(
    text: &'a str,
    max_tokens: usize,
    estimator: &TokenEstimator,
) -> (&'a str, usize) {
    let full = estimator.estimate(text);

    // Long texts can fit too; chunking would split their words and cut them
    if full <= max_tokens {
        return (text, full);
    }

    (cut_at_chunks(text, max_tokens, estimator), full)
}

/// Greedy chunk accumulation for texts known to exceed the budget
fn cut_at_chunks<'a>(text: &'a str, max_tokens: usize, estimator: &TokenEstimator) -> &'a str {
    // Byte offsets where each accepted chunk ends
    let mut boundaries = Vec::new();
    let mut total = 0usize;

    for (start, end) in chunk_bounds(text) {
        let tokens = estimator.estimate(&text[start..end]);
        if total + tokens > max_tokens {
            break;
        }
        total += tokens;
        boundaries.push(end);
    }

    // The chunk sum already bounds the prefix estimate; re-check anyway so the
    // guarantee does not depend on the estimator's rule set.
    while let Some(&end) = boundaries.last() {
        if estimator.estimate(&text[..end]) <= max_tokens {
            return &text[..end];
        }
        boundaries.pop();
    }

    ""
}

/// Yields `(start, end)` byte ranges of consecutive chunks of `CHUNK_CHARS` chars
fn chunk_bounds(text: &str) -> Vec<(usize, usize)> {
    let mut starts: Vec<usize> = text
        .char_indices()
        .step_by(CHUNK_CHARS)
        .map(|(idx, _)| idx)
        .collect();
    starts.push(text.len());
    starts.windows(2).map(|w| (w[0], w[1])).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_short_text_unchanged() {
        let est = TokenEstimator::new();
        let text = "A short page about cats.";
        assert_eq!(truncate_to_token_budget(text, 100, &est), text);
    }

    #[test]
    fn test_long_text_is_prefix_within_budget() {
        let est = TokenEstimator::new();
        let text = "lorem ipsum dolor sit amet ".repeat(500);
        let cut = truncate_to_token_budget(&text, 120, &est);

        assert!(text.starts_with(cut));
        assert!(cut.len() < text.len());
        assert!(est.estimate(cut) <= 120);
        assert_eq!(cut.chars().count() % CHUNK_CHARS, 0);
    }

    #[test]
    fn test_long_text_that_fits_is_unchanged() {
        let est = TokenEstimator::new();
        let text = "abcdefgh ".repeat(100);
        assert_eq!(est.estimate(&text), 200);
        assert!(text.len() > 200 * 4);

        assert_eq!(truncate_to_token_budget(&text, 200, &est), text);
    }

    #[test]
    fn test_measured_reports_whole_text_estimate() {
        let est = TokenEstimator::new();
        let text = "lorem ipsum dolor sit amet ".repeat(50);

        let (cut, full) = truncate_measured(&text, 30, &est);
        assert_eq!(full, est.estimate(&text));
        assert_eq!(cut, truncate_to_token_budget(&text, 30, &est));

        let (whole, full) = truncate_measured(&text, full, &est);
        assert_eq!(whole, text);
        assert_eq!(full, est.estimate(&text));
    }

    #[test]
    fn test_zero_budget_returns_empty() {
        let est = TokenEstimator::new();
        assert_eq!(truncate_to_token_budget("some text here", 0, &est), "");
    }

    #[test]
    fn test_multibyte_chunks_split_on_char_boundaries() {
        let est = TokenEstimator::new();
        let text = "日本語のテキスト".repeat(100);
        // Every char costs 3, so one chunk is 300 and two would be 600
        let cut = truncate_to_token_budget(&text, 450, &est);

        assert!(text.starts_with(cut));
        assert_eq!(cut.chars().count(), 100);
    }

    #[test]
    fn test_chunk_bounds_cover_text() {
        let text = "x".repeat(250);
        assert_eq!(
            chunk_bounds(&text),
            vec![(0, 100), (100, 200), (200, 250)]
        );
        assert!(chunk_bounds("").is_empty());
    }

    proptest! {
        #[test]
        fn prop_truncation_is_token_respecting_prefix(
            text in "[a-zA-Z0-9 .,!\n日本]{0,2000}",
            budget in 0usize..400,
        ) {
            let est = TokenEstimator::new();
            let cut = truncate_to_token_budget(&text, budget, &est);

            prop_assert!(text.starts_with(cut));
            if est.estimate(&text) > budget {
                prop_assert!(est.estimate(cut) <= budget);
            }
            if est.estimate(&text) <= budget {
                prop_assert_eq!(cut, text.as_str());
            }
        }
    }
}
