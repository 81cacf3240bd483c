//! Text similarity measures
//!
//! Two measures with distinct jobs:
//! - [`token_overlap`] clusters incoming reports into incident groups
//! - [`ratio`] suppresses near-duplicate knowledge-base entries
//!
//! Both are pure, deterministic, symmetric, and total over arbitrary text.

/// Acceptance threshold for knowledge-base duplicate suppression.
pub const KB_DUPLICATE_THRESHOLD: f64 = 0.85;

/// Lowercase whitespace tokens with punctuation stripped.
fn tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(|c| c.to_lowercase())
                .collect::<String>()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// Token-overlap similarity in [0, 1].
///
/// `|tokens(a) ∩ tokens(b)| / max(|tokens(a)|, |tokens(b)|)`. Empty token
/// sets score 0. 1.0 means the normalized token sets are identical.
pub fn token_overlap(a: &str, b: &str) -> f64 {
    let set_a: std::collections::HashSet<String> = tokens(a).into_iter().collect();
    let set_b: std::collections::HashSet<String> = tokens(b).into_iter().collect();

    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let shared = set_a.intersection(&set_b).count();
    shared as f64 / set_a.len().max(set_b.len()) as f64
}

/// General-purpose string-similarity ratio in [0, 1], edit-distance derived.
///
/// Case-folded before comparison. Used with [`KB_DUPLICATE_THRESHOLD`] to
/// decide whether two knowledge-base questions describe the same issue.
pub fn ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
}
