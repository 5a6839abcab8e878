//! Merged query suggestions
//!
//! Combines, in order, the caller's own matching search history, index
//! suggestions and hot keywords. Duplicate texts keep their first occurrence.

use novel_hub_core::{HotKeyword, SearchHistoryEntry};
use std::collections::HashSet;

use super::{Suggestion, SuggestionType};

/// Matching history entries kept per request, most recent first
pub const HISTORY_SUGGESTIONS: usize = 5;

/// Index suggestions requested per request
pub const INDEX_SUGGESTIONS: usize = 5;

/// Hot keywords appended per request
pub const HOT_SUGGESTIONS: usize = 3;

pub fn merge_suggestions(
    query: &str,
    history: &[SearchHistoryEntry],
    indexed: Vec<Suggestion>,
    hot: &[HotKeyword],
    limit: usize,
) -> Vec<Suggestion> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() || limit == 0 {
        return Vec::new();
    }

    let from_history = history
        .iter()
        .filter(|entry| entry.keyword.to_lowercase().contains(&needle))
        .take(HISTORY_SUGGESTIONS)
        .map(|entry| Suggestion {
            text: entry.keyword.clone(),
            suggestion_type: SuggestionType::History,
            score: entry.count as f32,
            novel_id: None,
        });

    let from_hot = hot.iter().take(HOT_SUGGESTIONS).map(|word| Suggestion {
        text: word.keyword.clone(),
        suggestion_type: SuggestionType::Hot,
        score: word.count as f32,
        novel_id: None,
    });

    let mut seen = HashSet::new();
    from_history
        .chain(indexed.into_iter().take(INDEX_SUGGESTIONS))
        .chain(from_hot)
        .filter(|s| seen.insert(s.text.clone()))
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn history(keyword: &str, count: i64) -> SearchHistoryEntry {
        SearchHistoryEntry {
            user_id: Some(1),
            client_addr: None,
            keyword: keyword.to_string(),
            count,
            last_seen: Utc::now(),
        }
    }

    fn indexed(text: &str) -> Suggestion {
        Suggestion {
            text: text.to_string(),
            suggestion_type: SuggestionType::Title,
            score: 1.0,
            novel_id: Some(1),
        }
    }

    fn hot(keyword: &str) -> HotKeyword {
        HotKeyword {
            keyword: keyword.to_string(),
            count: 9,
        }
    }

    #[test]
    fn test_order_is_history_index_hot() {
        let merged = merge_suggestions(
            "dragon",
            &[history("Dragon Lord", 3), history("city", 1)],
            vec![indexed("dragon king")],
            &[hot("fantasy")],
            10,
        );
        let texts: Vec<_> = merged.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Dragon Lord", "dragon king", "fantasy"]);
        assert_eq!(merged[0].suggestion_type, SuggestionType::History);
        assert_eq!(merged[2].suggestion_type, SuggestionType::Hot);
    }

    #[test]
    fn test_duplicates_keep_first() {
        let merged = merge_suggestions(
            "dragon",
            &[history("dragon lord", 3)],
            vec![indexed("dragon lord")],
            &[hot("dragon lord")],
            10,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].suggestion_type, SuggestionType::History);
    }

    #[test]
    fn test_limit_caps_output() {
        let merged = merge_suggestions(
            "a",
            &[],
            vec![indexed("a1"), indexed("a2"), indexed("a3")],
            &[hot("h1"), hot("h2")],
            2,
        );
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_history_matches_before_capping() {
        let mut entries: Vec<_> = (0..6).map(|i| history(&format!("city {}", i), 1)).collect();
        entries.push(history("dragon lord", 1));
        let merged = merge_suggestions("dragon", &entries, Vec::new(), &[], 10);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text, "dragon lord");
    }

    #[test]
    fn test_empty_query_yields_nothing() {
        let merged = merge_suggestions(" ", &[], vec![indexed("a")], &[hot("h")], 10);
        assert!(merged.is_empty());
    }
}
