//! Domain models shared by the discovery engine and its stores

pub mod activity;
pub mod clicks;
pub mod novel;

pub use activity::{
    Comment, HotKeyword, KeywordActivity, Rating, ReadingProgress, SearchActor,
    SearchHistoryEntry, SearchStats,
};
pub use clicks::{Board, ClickCounters, ClickWindow};
pub use novel::{validate_chapter_positions, Category, Chapter, Keyword, Novel, NovelStatus};

pub type NovelId = i64;
pub type UserId = i64;
pub type CategoryId = i64;
pub type KeywordId = i64;
pub type ChapterId = i64;
