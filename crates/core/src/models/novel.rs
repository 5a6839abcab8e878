//! Novel, chapter and taxonomy models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use super::clicks::ClickCounters;
use super::{CategoryId, ChapterId, KeywordId, NovelId, UserId};
use crate::error::DiscoveryError;

/// Moderation state of a novel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NovelStatus {
    Pending,
    Approved,
    Rejected,
}

impl NovelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for NovelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NovelStatus {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(DiscoveryError::invalid(format!(
                "unknown novel status: {}",
                other
            ))),
        }
    }
}

/// A labeled set of novels, optionally nested under a parent
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<CategoryId>,
}

impl Category {
    pub fn new(id: CategoryId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id: None,
        }
    }

    pub fn with_parent(mut self, parent_id: CategoryId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

/// Short tag attached to novels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: KeywordId,
    pub word: String,
    /// Non-negative relevance weight
    #[serde(default)]
    pub weight: f64,
}

impl Keyword {
    pub fn new(id: KeywordId, word: impl Into<String>) -> Self {
        Self {
            id,
            word: word.into(),
            weight: 1.0,
        }
    }
}

/// The unit of content
///
/// Rating aggregates are derived by the corpus store from the ratings table and
/// travel with the novel so that the engine can score without a second read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Novel {
    pub id: NovelId,
    pub title: String,
    pub author: String,
    pub protagonist: String,
    pub description: String,
    pub status: NovelStatus,
    pub word_count: i64,
    pub uploader_id: UserId,
    pub uploaded_at: DateTime<Utc>,
    pub clicks: ClickCounters,
    pub categories: Vec<Category>,
    pub keywords: Vec<Keyword>,
    pub average_rating: f64,
    pub rating_count: i64,
    #[serde(skip_serializing, default)]
    pub content_locator: String,
}

impl Novel {
    /// New pending novel with empty metadata
    pub fn new(
        id: NovelId,
        title: impl Into<String>,
        author: impl Into<String>,
        uploaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            author: author.into(),
            protagonist: String::new(),
            description: String::new(),
            status: NovelStatus::Pending,
            word_count: 0,
            uploader_id: 0,
            uploaded_at,
            clicks: ClickCounters::default(),
            categories: Vec::new(),
            keywords: Vec::new(),
            average_rating: 0.0,
            rating_count: 0,
            content_locator: String::new(),
        }
    }

    pub fn approved(mut self) -> Self {
        self.status = NovelStatus::Approved;
        self
    }

    pub fn with_status(mut self, status: NovelStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_protagonist(mut self, protagonist: impl Into<String>) -> Self {
        self.protagonist = protagonist.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_word_count(mut self, word_count: i64) -> Self {
        self.word_count = word_count;
        self
    }

    pub fn with_uploader(mut self, uploader_id: UserId) -> Self {
        self.uploader_id = uploader_id;
        self
    }

    pub fn with_categories(mut self, categories: Vec<Category>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<Keyword>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn with_clicks(mut self, clicks: ClickCounters) -> Self {
        self.clicks = clicks;
        self
    }

    pub fn with_rating(mut self, average_rating: f64, rating_count: i64) -> Self {
        self.average_rating = average_rating;
        self.rating_count = rating_count;
        self
    }

    pub fn with_content_locator(mut self, locator: impl Into<String>) -> Self {
        self.content_locator = locator.into();
        self
    }

    pub fn is_approved(&self) -> bool {
        self.status == NovelStatus::Approved
    }

    pub fn category_ids(&self) -> HashSet<CategoryId> {
        self.categories.iter().map(|c| c.id).collect()
    }

    pub fn keyword_words(&self) -> HashSet<&str> {
        self.keywords.iter().map(|k| k.word.as_str()).collect()
    }

    /// Keyword words joined with spaces, as fed to the search index
    pub fn keyword_blob(&self) -> String {
        self.keywords
            .iter()
            .map(|k| k.word.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn has_any_category(&self, ids: &HashSet<CategoryId>) -> bool {
        self.categories.iter().any(|c| ids.contains(&c.id))
    }

    pub fn has_any_keyword(&self, words: &HashSet<String>) -> bool {
        self.keywords.iter().any(|k| words.contains(&k.word))
    }
}

/// An ordered segment of a novel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: ChapterId,
    pub novel_id: NovelId,
    pub title: String,
    /// 1-based position within the novel
    pub position: i32,
    pub word_count: i64,
    #[serde(skip_serializing, default)]
    pub content_locator: String,
}

/// Checks that chapter positions run 1, 2, 3, ... without gaps.
///
/// The slice must already be sorted by position.
pub fn validate_chapter_positions(chapters: &[Chapter]) -> Result<(), DiscoveryError> {
    for (index, chapter) in chapters.iter().enumerate() {
        let expected = index as i32 + 1;
        if chapter.position != expected {
            return Err(DiscoveryError::invalid(format!(
                "novel {} chapter positions are not contiguous: expected {}, found {}",
                chapter.novel_id, expected, chapter.position
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn chapter(position: i32) -> Chapter {
        Chapter {
            id: position as i64,
            novel_id: 1,
            title: format!("Chapter {}", position),
            position,
            word_count: 1000,
            content_locator: String::new(),
        }
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("approved".parse::<NovelStatus>().unwrap(), NovelStatus::Approved);
        assert_eq!("PENDING".parse::<NovelStatus>().unwrap(), NovelStatus::Pending);
        assert!("published".parse::<NovelStatus>().is_err());
    }

    #[test]
    fn test_keyword_blob_joins_with_spaces() {
        let novel = Novel::new(1, "t", "a", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
            .with_keywords(vec![Keyword::new(1, "magic"), Keyword::new(2, "sword")]);
        assert_eq!(novel.keyword_blob(), "magic sword");
    }

    #[test]
    fn test_new_novel_is_pending() {
        let novel = Novel::new(1, "t", "a", Utc::now());
        assert!(!novel.is_approved());
        assert!(novel.approved().is_approved());
    }

    #[test]
    fn test_contiguous_chapters_are_valid() {
        let chapters = vec![chapter(1), chapter(2), chapter(3)];
        assert!(validate_chapter_positions(&chapters).is_ok());
        assert!(validate_chapter_positions(&[]).is_ok());
    }

    #[test]
    fn test_chapter_gap_is_rejected() {
        let chapters = vec![chapter(1), chapter(3)];
        assert!(matches!(
            validate_chapter_positions(&chapters),
            Err(DiscoveryError::InvalidArgument(_))
        ));

        let chapters = vec![chapter(2)];
        assert!(validate_chapter_positions(&chapters).is_err());
    }
}
