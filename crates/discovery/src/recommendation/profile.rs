//! User preference profile derived from reading, rating and comment history

use chrono::{DateTime, Utc};
use novel_hub_core::{
    CategoryId, CorpusStore, HistorySource, Novel, NovelId, Rating, ReadingProgress, Result,
    UserId,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// One preferred category and its accumulated score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryPreference {
    pub category_id: CategoryId,
    pub name: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordPreference {
    pub word: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub user_id: UserId,
    /// Highest-scoring categories first
    pub preferred_categories: Vec<CategoryPreference>,
    /// Not yet derived from history; always empty
    pub preferred_keywords: Vec<KeywordPreference>,
    pub built_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn category_ids(&self) -> HashSet<CategoryId> {
        self.preferred_categories
            .iter()
            .map(|c| c.category_id)
            .collect()
    }

    pub fn keyword_words(&self) -> HashSet<String> {
        self.preferred_keywords
            .iter()
            .map(|k| k.word.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.preferred_categories.is_empty() && self.preferred_keywords.is_empty()
    }
}

/// Fraction of a novel read, clamped to [0, 1]
pub fn reading_fraction(position: i64, word_count: i64) -> f64 {
    if word_count <= 0 {
        return 0.0;
    }
    (position as f64 / word_count as f64).clamp(0.0, 1.0)
}

#[derive(Default)]
struct CategoryScores {
    scores: HashMap<CategoryId, (String, f64)>,
}

impl CategoryScores {
    fn add(&mut self, novel: &Novel, amount: f64) {
        for category in &novel.categories {
            let entry = self
                .scores
                .entry(category.id)
                .or_insert_with(|| (category.name.clone(), 0.0));
            entry.1 += amount;
        }
    }

    /// Top `n` by score descending, lower id first among equals
    fn top(self, n: usize) -> Vec<CategoryPreference> {
        let mut preferences: Vec<CategoryPreference> = self
            .scores
            .into_iter()
            .map(|(category_id, (name, score))| CategoryPreference {
                category_id,
                name,
                score,
            })
            .collect();
        preferences.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.category_id.cmp(&b.category_id))
        });
        preferences.truncate(n);
        preferences
    }
}

/// Builds user profiles from a history source
pub struct ProfileBuilder<'a> {
    pub corpus: &'a dyn CorpusStore,
    pub history: &'a dyn HistorySource,
    /// Entries read per history kind
    pub depth: usize,
    /// Categories kept in the profile
    pub top_categories: usize,
}

impl<'a> ProfileBuilder<'a> {
    pub async fn build(&self, user_id: UserId, now: DateTime<Utc>) -> Result<UserProfile> {
        let reading = self.history.recent_reading(user_id, self.depth).await?;
        let ratings = self.history.recent_ratings(user_id, self.depth).await?;
        // Collected for future weighting; comments do not contribute yet.
        let comments = self.history.recent_comments(user_id, self.depth).await?;

        let referenced: HashSet<NovelId> = reading
            .iter()
            .map(|r| r.novel_id)
            .chain(ratings.iter().map(|r| r.novel_id))
            .collect();
        let novels = self.load(&referenced).await?;

        let scores = accumulate(&reading, &ratings, &novels);
        let profile = UserProfile {
            user_id,
            preferred_categories: scores.top(self.top_categories),
            preferred_keywords: Vec::new(),
            built_at: now,
        };

        debug!(
            user_id,
            reading = reading.len(),
            ratings = ratings.len(),
            comments = comments.len(),
            categories = profile.preferred_categories.len(),
            "User profile built"
        );
        Ok(profile)
    }

    async fn load(&self, ids: &HashSet<NovelId>) -> Result<HashMap<NovelId, Novel>> {
        let mut novels = HashMap::with_capacity(ids.len());
        for &id in ids {
            match self.corpus.novel(id).await {
                Ok(novel) => {
                    novels.insert(id, novel);
                }
                Err(e) if e.is_not_found() => {
                    warn!(novel_id = id, "History references a missing novel");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(novels)
    }
}

fn accumulate(
    reading: &[ReadingProgress],
    ratings: &[Rating],
    novels: &HashMap<NovelId, Novel>,
) -> CategoryScores {
    let mut scores = CategoryScores::default();
    for progress in reading {
        if let Some(novel) = novels.get(&progress.novel_id) {
            scores.add(novel, reading_fraction(progress.position, novel.word_count));
        }
    }
    for rating in ratings {
        if let Some(novel) = novels.get(&rating.novel_id) {
            scores.add(novel, f64::from(rating.score));
        }
    }
    scores
}
