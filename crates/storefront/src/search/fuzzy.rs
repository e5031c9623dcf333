//! Typo-tolerant word similarity.
//!
//! Levenshtein distance is only computed for pairs that pass cheap
//! pre-filters: both words at least [`MIN_FUZZY_LEN`] characters, lengths
//! within one of each other, and at least half of the combined character set
//! shared. Short words never fuzzy-match.

use std::collections::HashSet;

/// Default similarity threshold.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.85;

/// Minimum word length, in characters, for fuzzy matching.
pub const MIN_FUZZY_LEN: usize = 5;

/// Minimum shared fraction of the combined character set.
const MIN_CHARSET_OVERLAP: f64 = 0.5;

/// Jaccard overlap of the character sets of `a` and `b`.
#[allow(clippy::cast_precision_loss)] // Character set sizes are tiny
fn charset_overlap(a: &str, b: &str) -> f64 {
    let a: HashSet<char> = a.chars().collect();
    let b: HashSet<char> = b.chars().collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

/// Similarity of two normalized words in `[0, 1]`.
///
/// Returns `0.0` when the pair fails the pre-filters or the normalized
/// Levenshtein similarity (`1 - distance / max_len`) is below `threshold`.
#[must_use]
#[allow(clippy::cast_precision_loss)] // Word lengths will never exceed f64 precision
pub fn fuzzy_match(a: &str, b: &str, threshold: f64) -> f64 {
    let len_a = a.chars().count();
    let len_b = b.chars().count();

    if len_a < MIN_FUZZY_LEN || len_b < MIN_FUZZY_LEN || len_a.abs_diff(len_b) > 1 {
        return 0.0;
    }

    if charset_overlap(a, b) < MIN_CHARSET_OVERLAP {
        return 0.0;
    }

    let max_len = len_a.max(len_b) as f64;
    let similarity = 1.0 - strsim::levenshtein(a, b) as f64 / max_len;

    if similarity >= threshold {
        similarity
    } else {
        0.0
    }
}
