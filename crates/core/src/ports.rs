//! Capabilities the discovery engine consumes from the corpus store
//!
//! The store owns the durable form of novels, chapters, taxonomy and reader
//! activity. The engine only sees these traits, so the same engine runs
//! against PostgreSQL in production and an in-memory store in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::error::DiscoveryError;
use crate::models::{
    Category, CategoryId, ClickCounters, ClickWindow, Comment, HotKeyword, Novel, NovelId, Rating,
    ReadingProgress, SearchActor, SearchHistoryEntry, SearchStats, UserId,
};
use crate::Result;

/// Predicates for approved-novel lookups. Empty predicates match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NovelFilter {
    /// Novel must carry at least one of these categories
    pub any_category: Option<Vec<CategoryId>>,
    /// Novel must carry at least one of these keyword words
    pub any_keyword: Option<Vec<String>>,
    /// Novel must have been uploaded at or after this instant
    pub uploaded_since: Option<DateTime<Utc>>,
}

impl NovelFilter {
    pub fn in_category(category_id: CategoryId) -> Self {
        Self {
            any_category: Some(vec![category_id]),
            ..Self::default()
        }
    }

    pub fn uploaded_since(since: DateTime<Utc>) -> Self {
        Self {
            uploaded_since: Some(since),
            ..Self::default()
        }
    }

    /// Evaluates the filter against an already-approved novel
    pub fn matches(&self, novel: &Novel) -> bool {
        if let Some(categories) = &self.any_category {
            let wanted: HashSet<CategoryId> = categories.iter().copied().collect();
            if !novel.has_any_category(&wanted) {
                return false;
            }
        }
        if let Some(words) = &self.any_keyword {
            let wanted: HashSet<String> = words.iter().cloned().collect();
            if !novel.has_any_keyword(&wanted) {
                return false;
            }
        }
        if let Some(since) = self.uploaded_since {
            if novel.uploaded_at < since {
                return false;
            }
        }
        true
    }
}

/// Read access to novels and their content
#[async_trait]
pub trait CorpusStore: Send + Sync {
    /// Novel by id in any moderation state
    async fn novel(&self, id: NovelId) -> Result<Novel>;

    /// Every approved novel matching `filter`, read as one consistent snapshot
    async fn approved_novels(&self, filter: &NovelFilter) -> Result<Vec<Novel>>;

    /// Full text of a novel, resolved through its content locator
    async fn novel_content(&self, id: NovelId) -> Result<String>;

    async fn categories(&self) -> Result<Vec<Category>>;

    /// Approved novel by id; anything else is `NotFound`
    async fn approved_novel(&self, id: NovelId) -> Result<Novel> {
        let novel = self.novel(id).await?;
        if novel.is_approved() {
            Ok(novel)
        } else {
            Err(DiscoveryError::not_found("novel", id))
        }
    }

    /// The approved novels among `ids`, in no particular order; missing or
    /// unapproved ids are left out
    async fn approved_novels_by_id(&self, ids: &[NovelId]) -> Result<Vec<Novel>> {
        let mut novels = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.approved_novel(id).await {
                Ok(novel) => novels.push(novel),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(novels)
    }
}

/// A user's reading, rating and comment history, most recent first
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn recent_reading(&self, user_id: UserId, limit: usize) -> Result<Vec<ReadingProgress>>;

    async fn recent_ratings(&self, user_id: UserId, limit: usize) -> Result<Vec<Rating>>;

    async fn recent_comments(&self, user_id: UserId, limit: usize) -> Result<Vec<Comment>>;

    /// Every novel the user has a reading-progress entry for
    async fn read_novel_ids(&self, user_id: UserId) -> Result<HashSet<NovelId>>;
}

/// Owner of the four click counter columns
#[async_trait]
pub trait ClickCounterStore: Send + Sync {
    /// Advances all four counters of an approved novel as one group
    async fn increment(&self, novel_id: NovelId) -> Result<ClickCounters>;

    /// Zeroes one window counter on every novel, returning rows touched
    async fn reset(&self, window: ClickWindow) -> Result<u64>;
}

#[async_trait]
pub trait SearchHistoryStore: Send + Sync {
    async fn record(&self, actor: &SearchActor, keyword: &str, at: DateTime<Utc>) -> Result<()>;

    /// Keywords by aggregate count, most recent first among equals
    async fn hot_keywords(&self, limit: usize) -> Result<Vec<HotKeyword>>;

    async fn user_history(&self, user_id: UserId, limit: usize)
        -> Result<Vec<SearchHistoryEntry>>;

    async fn clear_user_history(&self, user_id: UserId) -> Result<u64>;

    /// Totals plus the `limit` most searched and most recently searched keywords
    async fn search_stats(&self, limit: usize) -> Result<SearchStats>;
}
