//! Reader activity: ratings, comments, reading progress and search history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ChapterId, NovelId, UserId};
use crate::error::DiscoveryError;

/// A user's 1-5 score for a novel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub novel_id: NovelId,
    pub score: i16,
    #[serde(default)]
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Rating {
    pub fn new(
        user_id: UserId,
        novel_id: NovelId,
        score: i16,
        created_at: DateTime<Utc>,
    ) -> Result<Self, DiscoveryError> {
        if !(1..=5).contains(&score) {
            return Err(DiscoveryError::invalid(format!(
                "rating score must be between 1 and 5, got {}",
                score
            )));
        }
        Ok(Self {
            user_id,
            novel_id,
            score,
            review: None,
            created_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub user_id: UserId,
    pub novel_id: NovelId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Furthest point a user reached in a novel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingProgress {
    pub user_id: UserId,
    pub novel_id: NovelId,
    pub chapter_id: Option<ChapterId>,
    /// Character position within the chapter
    pub position: i64,
    pub updated_at: DateTime<Utc>,
}

/// Who issued a search: a signed-in user or an anonymous client address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum SearchActor {
    User(UserId),
    Anonymous(String),
}

impl SearchActor {
    /// Stable key used to group history rows per actor
    pub fn key(&self) -> String {
        match self {
            Self::User(id) => format!("user:{}", id),
            Self::Anonymous(addr) => format!("addr:{}", addr),
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            Self::Anonymous(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHistoryEntry {
    pub user_id: Option<UserId>,
    pub client_addr: Option<String>,
    pub keyword: String,
    pub count: i64,
    pub last_seen: DateTime<Utc>,
}

/// Aggregate search count of one keyword across all actors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotKeyword {
    pub keyword: String,
    pub count: i64,
}

/// A keyword's aggregate count and when anyone last searched it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordActivity {
    pub keyword: String,
    pub count: i64,
    pub last_seen: DateTime<Utc>,
}

/// Site-wide search statistics for administrators
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Searches recorded across all actors and keywords
    pub total_searches: i64,
    pub distinct_keywords: i64,
    pub top_keywords: Vec<HotKeyword>,
    pub recent_searches: Vec<KeywordActivity>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        let now = Utc::now();
        assert!(Rating::new(1, 1, 1, now).is_ok());
        assert!(Rating::new(1, 1, 5, now).is_ok());
        assert!(Rating::new(1, 1, 0, now).is_err());
        assert!(Rating::new(1, 1, 6, now).is_err());
    }

    #[test]
    fn test_actor_keys_are_distinct() {
        assert_eq!(SearchActor::User(7).key(), "user:7");
        assert_eq!(
            SearchActor::Anonymous("10.0.0.1".to_string()).key(),
            "addr:10.0.0.1"
        );
        assert_eq!(SearchActor::User(7).user_id(), Some(7));
        assert_eq!(SearchActor::Anonymous("x".into()).user_id(), None);
    }
}
