//! Discovery recommendations: similar, popular, new and personalized
//!
//! Every strategy reads approved novels only, returns at most `limit` entries
//! and resolves remaining ties by lower novel id so identical input state
//! always yields identical output.

pub mod profile;
pub mod similarity;

pub use profile::{reading_fraction, CategoryPreference, KeywordPreference, UserProfile};
pub use similarity::{jaccard_similarity, similarity};

use chrono::Duration as ChronoDuration;
use novel_hub_core::{
    Clock, CorpusStore, HistorySource, Novel, NovelFilter, NovelId, Result, UserId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::cache::{CacheStats, TtlCache, PREFIX_PROFILE};
use crate::config::RecommendationConfig;

// Popularity weights
const POPULAR_CLICK_WEIGHT: f64 = 0.4;
const POPULAR_RATING_WEIGHT: f64 = 0.3;
const POPULAR_COUNT_WEIGHT: f64 = 0.2;

// Personalized weights
const PREFERRED_CATEGORY_BONUS: f64 = 30.0;
const PREFERRED_KEYWORD_BONUS: f64 = 20.0;
const CLICK_SCORE_CAP: f64 = 20.0;
const RATING_MULTIPLIER: f64 = 2.0;

/// Sort key for survivors of the similarity gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarSortKey {
    /// All-time clicks descending
    #[default]
    Clicks,
    /// Similarity descending
    Similarity,
}

/// Recommendation strategies reachable through the public API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    Popular,
    New,
    Similar,
}

impl std::str::FromStr for RecommendationKind {
    type Err = novel_hub_core::DiscoveryError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "popular" => Ok(Self::Popular),
            "new" => Ok(Self::New),
            "similar" => Ok(Self::Similar),
            other => Err(novel_hub_core::DiscoveryError::invalid(format!(
                "unknown recommendation type: {}",
                other
            ))),
        }
    }
}

/// `0.4 * clicks_total + 0.3 * 10 * avg_rating + 0.2 * rating_count`
pub fn popularity_score(novel: &Novel) -> f64 {
    POPULAR_CLICK_WEIGHT * novel.clicks.total as f64
        + POPULAR_RATING_WEIGHT * 10.0 * novel.average_rating
        + POPULAR_COUNT_WEIGHT * novel.rating_count as f64
}

/// Score of a candidate against a user profile
pub fn personalized_score(novel: &Novel, profile: &UserProfile) -> f64 {
    let category_match = if novel.has_any_category(&profile.category_ids()) {
        1.0
    } else {
        0.0
    };
    let keyword_match = if novel.has_any_keyword(&profile.keyword_words()) {
        1.0
    } else {
        0.0
    };

    PREFERRED_CATEGORY_BONUS * category_match
        + PREFERRED_KEYWORD_BONUS * keyword_match
        + (novel.clicks.total as f64 / 1000.0).min(CLICK_SCORE_CAP)
        + RATING_MULTIPLIER * novel.average_rating
}

fn sort_scored(scored: &mut [(f64, Novel)]) {
    scored.sort_by(|(sa, a), (sb, b)| sb.total_cmp(sa).then_with(|| a.id.cmp(&b.id)));
}

pub struct RecommendationEngine {
    corpus: Arc<dyn CorpusStore>,
    history: Arc<dyn HistorySource>,
    clock: Arc<dyn Clock>,
    config: RecommendationConfig,
    profiles: TtlCache<UserProfile>,
}

impl RecommendationEngine {
    pub fn new(
        corpus: Arc<dyn CorpusStore>,
        history: Arc<dyn HistorySource>,
        clock: Arc<dyn Clock>,
        config: RecommendationConfig,
        profile_ttl: Duration,
        max_profiles: usize,
    ) -> Self {
        Self {
            corpus,
            history,
            clock,
            config,
            profiles: TtlCache::new(PREFIX_PROFILE, profile_ttl).with_max_entries(max_profiles),
        }
    }

    /// Approved novels whose similarity to `novel_id` exceeds the threshold
    #[instrument(skip(self))]
    pub async fn similar(&self, novel_id: NovelId, limit: usize) -> Result<Vec<Novel>> {
        let target = self.corpus.approved_novel(novel_id).await?;
        let candidates = self.corpus.approved_novels(&NovelFilter::default()).await?;

        let mut survivors: Vec<(f64, Novel)> = candidates
            .into_iter()
            .filter(|n| n.is_approved() && n.id != target.id)
            .map(|n| (similarity(&target, &n), n))
            .filter(|(sim, _)| *sim > self.config.similarity_threshold)
            .collect();

        match self.config.similar_sort {
            SimilarSortKey::Clicks => survivors.sort_by(|(_, a), (_, b)| {
                b.clicks
                    .total
                    .cmp(&a.clicks.total)
                    .then_with(|| a.id.cmp(&b.id))
            }),
            SimilarSortKey::Similarity => sort_scored(&mut survivors),
        }

        let result: Vec<Novel> = survivors.into_iter().take(limit).map(|(_, n)| n).collect();
        debug!(returned = result.len(), "Similar novels computed");
        Ok(result)
    }

    /// Approved novels by composite popularity
    #[instrument(skip(self))]
    pub async fn popular(&self, limit: usize) -> Result<Vec<Novel>> {
        let mut novels: Vec<Novel> = self
            .corpus
            .approved_novels(&NovelFilter::default())
            .await?
            .into_iter()
            .filter(Novel::is_approved)
            .collect();

        novels.sort_by(|a, b| {
            popularity_score(b)
                .total_cmp(&popularity_score(a))
                .then_with(|| b.uploaded_at.cmp(&a.uploaded_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        novels.truncate(limit);
        Ok(novels)
    }

    /// Well-received novels uploaded within the new-book window, newest first
    #[instrument(skip(self))]
    pub async fn new_books(&self, limit: usize) -> Result<Vec<Novel>> {
        let now = self.clock.now();
        let since = now - ChronoDuration::days(self.config.new_book_window_days);

        let mut novels: Vec<Novel> = self
            .corpus
            .approved_novels(&NovelFilter::uploaded_since(since))
            .await?
            .into_iter()
            .filter(|n| n.is_approved() && n.uploaded_at >= since && n.uploaded_at <= now)
            .filter(|n| {
                n.average_rating >= self.config.new_book_min_rating
                    || n.rating_count >= self.config.new_book_min_ratings
            })
            .collect();

        novels.sort_by(|a, b| {
            b.uploaded_at
                .cmp(&a.uploaded_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        novels.truncate(limit);
        Ok(novels)
    }

    /// The user's preference profile, cached for the profile TTL
    #[instrument(skip(self))]
    pub async fn profile(&self, user_id: UserId) -> Result<Arc<UserProfile>> {
        let key = format!("{}:{}", PREFIX_PROFILE, user_id);
        self.profiles
            .get_or_try_insert_with(key, || async {
                profile::ProfileBuilder {
                    corpus: self.corpus.as_ref(),
                    history: self.history.as_ref(),
                    depth: self.config.history_depth,
                    top_categories: self.config.preferred_categories,
                }
                .build(user_id, self.clock.now())
                .await
            })
            .await
    }

    /// Novels matching the user's preferences that they have not started
    #[instrument(skip(self))]
    pub async fn personalized(&self, user_id: UserId, limit: usize) -> Result<Vec<Novel>> {
        let profile = self.profile(user_id).await?;
        let already_read = self.history.read_novel_ids(user_id).await?;

        let categories: Vec<_> = profile
            .preferred_categories
            .iter()
            .map(|c| c.category_id)
            .collect();
        let keywords: Vec<_> = profile
            .preferred_keywords
            .iter()
            .map(|k| k.word.clone())
            .collect();
        let filter = NovelFilter {
            any_category: (!categories.is_empty()).then_some(categories),
            any_keyword: (!keywords.is_empty()).then_some(keywords),
            uploaded_since: None,
        };

        let mut scored: Vec<(f64, Novel)> = self
            .corpus
            .approved_novels(&filter)
            .await?
            .into_iter()
            .filter(|n| n.is_approved() && filter.matches(n) && !already_read.contains(&n.id))
            .map(|n| (personalized_score(&n, &profile), n))
            .collect();

        sort_scored(&mut scored);
        let result: Vec<Novel> = scored.into_iter().take(limit).map(|(_, n)| n).collect();
        debug!(
            preferred = profile.preferred_categories.len(),
            excluded = already_read.len(),
            returned = result.len(),
            "Personalized recommendations computed"
        );
        Ok(result)
    }

    pub fn profile_stats(&self) -> CacheStats {
        self.profiles.stats()
    }

    /// Drops a cached profile so the next request rebuilds it
    pub fn forget_profile(&self, user_id: UserId) {
        self.profiles
            .invalidate(&format!("{}:{}", PREFIX_PROFILE, user_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use novel_hub_core::{Category, ClickCounters};

    #[test]
    fn test_popularity_score() {
        let novel = Novel::new(1, "t", "a", Utc::now())
            .with_clicks(ClickCounters::new(100, 0, 0, 0))
            .with_rating(4.0, 10);
        // 40 + 12 + 2
        assert!((popularity_score(&novel) - 54.0).abs() < 1e-9);
    }

    #[test]
    fn test_personalized_score_worked_example() {
        let profile = UserProfile {
            user_id: 1,
            preferred_categories: vec![CategoryPreference {
                category_id: 1,
                name: "fantasy".into(),
                score: 5.5,
            }],
            preferred_keywords: Vec::new(),
            built_at: Utc::now(),
        };
        let candidate = Novel::new(3, "C", "z", Utc::now())
            .approved()
            .with_categories(vec![Category::new(1, "fantasy")])
            .with_clicks(ClickCounters::new(2000, 0, 0, 0))
            .with_rating(4.0, 3);
        assert!((personalized_score(&candidate, &profile) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_click_component_is_capped() {
        let profile = UserProfile {
            user_id: 1,
            preferred_categories: Vec::new(),
            preferred_keywords: Vec::new(),
            built_at: Utc::now(),
        };
        let novel = Novel::new(1, "t", "a", Utc::now())
            .with_clicks(ClickCounters::new(1_000_000, 0, 0, 0));
        assert!((personalized_score(&novel, &profile) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("popular".parse::<RecommendationKind>().unwrap(), RecommendationKind::Popular);
        assert_eq!("NEW".parse::<RecommendationKind>().unwrap(), RecommendationKind::New);
        assert!("trending".parse::<RecommendationKind>().is_err());
    }
}
