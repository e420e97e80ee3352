//! Pluggable text similarity used for deduplication.

use std::collections::BTreeSet;

/// Scores how alike two memory texts are.
///
/// Implementations return a value in `0.0..=1.0`; the merge rule only
/// compares the score against the configured threshold.
pub trait SimilarityScorer: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &'static str;

    /// Similarity of two texts.
    fn score(&self, left: &str, right: &str) -> f64;
}

/// Jaccard overlap of lowercase word tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenJaccard;

impl SimilarityScorer for TokenJaccard {
    fn name(&self) -> &'static str {
        "token-jaccard"
    }

    fn score(&self, left: &str, right: &str) -> f64 {
        let left = tokenize(left);
        let right = tokenize(right);
        if left.is_empty() && right.is_empty() {
            return 1.0;
        }
        let intersection = left.intersection(&right).count();
        let union = left.union(&right).count();
        if union == 0 {
            0.0
        } else {
            intersection as f64 / union as f64
        }
    }
}

/// Lowercase word tokens; anything other than alphanumerics and `_` splits.
pub(crate) fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}
