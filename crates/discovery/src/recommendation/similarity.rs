//! Content-based similarity between two novels

use novel_hub_core::Novel;
use std::collections::HashSet;
use std::hash::Hash;

const CATEGORY_WEIGHT: f64 = 0.4;
const KEYWORD_WEIGHT: f64 = 0.4;
const AUTHOR_WEIGHT: f64 = 0.2;

/// |A ∩ B| / |A ∪ B|
///
/// Two empty sets are identical (1.0); exactly one empty set shares nothing (0.0).
pub fn jaccard_similarity<T: Eq + Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }

    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// `0.4 * category_jaccard + 0.4 * keyword_jaccard + 0.2 * same_author`
///
/// Categories compare by id, keywords by word.
pub fn similarity(a: &Novel, b: &Novel) -> f64 {
    let categories = jaccard_similarity(&a.category_ids(), &b.category_ids());
    let keywords = jaccard_similarity(&a.keyword_words(), &b.keyword_words());
    let author = if a.author == b.author { 1.0 } else { 0.0 };

    CATEGORY_WEIGHT * categories + KEYWORD_WEIGHT * keywords + AUTHOR_WEIGHT * author
}
