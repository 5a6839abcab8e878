use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use novel_hub_core::{
    validate_chapter_positions, Category, CategoryId, Chapter, ClickCounterStore, ClickCounters,
    ClickWindow, Comment, CorpusStore, DiscoveryError, HistorySource, HotKeyword, KeywordActivity,
    Novel, NovelFilter, NovelId, NovelStatus, Rating, ReadingProgress, Result, SearchActor,
    SearchHistoryEntry, SearchHistoryStore, SearchStats, UserId,
};
use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// In-process corpus store
///
/// Each novel row sits behind its own dashmap shard lock, so the four click
/// counters move together. Window resets hold `epoch` exclusively while
/// snapshot reads hold it shared, which keeps a ranking read from observing a
/// half-applied reset.
#[derive(Default)]
pub struct MemoryCorpus {
    novels: DashMap<NovelId, Novel>,
    categories: DashMap<CategoryId, Category>,
    chapters: DashMap<NovelId, Vec<Chapter>>,
    blobs: DashMap<String, String>,
    progress: DashMap<UserId, Vec<ReadingProgress>>,
    ratings: DashMap<UserId, Vec<Rating>>,
    comments: DashMap<UserId, Vec<Comment>>,
    search_history: DashMap<(String, String), SearchHistoryEntry>,
    epoch: RwLock<()>,
}

impl MemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Search counts summed per keyword across actors
    fn keyword_totals(&self) -> Vec<KeywordActivity> {
        let mut totals: HashMap<String, KeywordActivity> = HashMap::new();
        for entry in self.search_history.iter() {
            let slot = totals
                .entry(entry.keyword.clone())
                .or_insert_with(|| KeywordActivity {
                    keyword: entry.keyword.clone(),
                    count: 0,
                    last_seen: entry.last_seen,
                });
            slot.count += entry.count;
            slot.last_seen = slot.last_seen.max(entry.last_seen);
        }
        totals.into_values().collect()
    }

    fn shared(&self) -> RwLockReadGuard<'_, ()> {
        self.epoch.read().unwrap_or_else(|e| e.into_inner())
    }

    fn exclusive(&self) -> RwLockWriteGuard<'_, ()> {
        self.epoch.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Inserts or replaces a novel, registering its categories
    pub fn insert_novel(&self, novel: Novel) {
        for category in &novel.categories {
            self.categories
                .entry(category.id)
                .or_insert_with(|| category.clone());
        }
        self.novels.insert(novel.id, novel);
    }

    pub fn insert_category(&self, category: Category) {
        self.categories.insert(category.id, category);
    }

    pub fn set_status(&self, novel_id: NovelId, status: NovelStatus) -> Result<()> {
        let mut novel = self
            .novels
            .get_mut(&novel_id)
            .ok_or_else(|| DiscoveryError::not_found("novel", novel_id))?;
        novel.status = status;
        Ok(())
    }

    pub fn remove_novel(&self, novel_id: NovelId) -> Option<Novel> {
        self.chapters.remove(&novel_id);
        self.novels.remove(&novel_id).map(|(_, novel)| novel)
    }

    /// Stores text under a content locator
    pub fn put_content(&self, locator: impl Into<String>, text: impl Into<String>) {
        self.blobs.insert(locator.into(), text.into());
    }

    /// Appends a chapter, keeping positions gap-free from 1
    pub fn add_chapter(&self, chapter: Chapter) -> Result<()> {
        let mut chapters = self.chapters.entry(chapter.novel_id).or_default();
        let mut candidate = chapters.value().clone();
        candidate.push(chapter);
        candidate.sort_by_key(|c| c.position);
        validate_chapter_positions(&candidate)?;
        *chapters = candidate;
        Ok(())
    }

    /// Records reading progress, replacing the user's previous entry for the novel
    pub fn add_progress(&self, progress: ReadingProgress) {
        let mut entries = self.progress.entry(progress.user_id).or_default();
        entries.retain(|p| p.novel_id != progress.novel_id);
        entries.push(progress);
    }

    /// Records a rating and refreshes the novel's rating aggregates
    pub fn add_rating(&self, rating: Rating) {
        let novel_id = rating.novel_id;
        {
            let mut entries = self.ratings.entry(rating.user_id).or_default();
            entries.retain(|r| r.novel_id != novel_id);
            entries.push(rating);
        }

        let (sum, count) = self
            .ratings
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|r| r.novel_id == novel_id)
                    .map(|r| i64::from(r.score))
                    .collect::<Vec<_>>()
            })
            .fold((0i64, 0i64), |(sum, count), score| (sum + score, count + 1));

        if let Some(mut novel) = self.novels.get_mut(&novel_id) {
            novel.rating_count = count;
            novel.average_rating = if count == 0 {
                0.0
            } else {
                sum as f64 / count as f64
            };
        }
    }

    pub fn add_comment(&self, comment: Comment) {
        self.comments.entry(comment.user_id).or_default().push(comment);
    }

    fn recent<T: Clone>(
        map: &DashMap<UserId, Vec<T>>,
        user_id: UserId,
        limit: usize,
        at: impl Fn(&T) -> DateTime<Utc>,
    ) -> Vec<T> {
        let mut items = map
            .get(&user_id)
            .map(|entries| entries.value().clone())
            .unwrap_or_default();
        items.sort_by_key(|item| std::cmp::Reverse(at(item)));
        items.truncate(limit);
        items
    }
}

#[async_trait]
impl CorpusStore for MemoryCorpus {
    async fn novel(&self, id: NovelId) -> Result<Novel> {
        self.novels
            .get(&id)
            .map(|n| n.value().clone())
            .ok_or_else(|| DiscoveryError::not_found("novel", id))
    }

    async fn approved_novels(&self, filter: &NovelFilter) -> Result<Vec<Novel>> {
        let _snapshot = self.shared();
        let mut novels: Vec<Novel> = self
            .novels
            .iter()
            .filter(|n| n.is_approved() && filter.matches(n.value()))
            .map(|n| n.value().clone())
            .collect();
        novels.sort_by_key(|n| n.id);
        Ok(novels)
    }

    async fn novel_content(&self, id: NovelId) -> Result<String> {
        let novel = self.novel(id).await?;
        if let Some(text) = self.blobs.get(&novel.content_locator) {
            return Ok(text.value().clone());
        }

        // Fall back to the chapter files in reading order.
        let chapters = self
            .chapters
            .get(&id)
            .map(|c| c.value().clone())
            .unwrap_or_default();
        let parts: Vec<String> = chapters
            .iter()
            .filter_map(|c| self.blobs.get(&c.content_locator).map(|t| t.value().clone()))
            .collect();
        if parts.is_empty() {
            return Err(DiscoveryError::not_found("content", id));
        }
        Ok(parts.join("\n"))
    }

    async fn categories(&self) -> Result<Vec<Category>> {
        let mut categories: Vec<Category> =
            self.categories.iter().map(|c| c.value().clone()).collect();
        categories.sort_by_key(|c| c.id);
        Ok(categories)
    }
}

#[async_trait]
impl HistorySource for MemoryCorpus {
    async fn recent_reading(&self, user_id: UserId, limit: usize) -> Result<Vec<ReadingProgress>> {
        Ok(Self::recent(&self.progress, user_id, limit, |p| p.updated_at))
    }

    async fn recent_ratings(&self, user_id: UserId, limit: usize) -> Result<Vec<Rating>> {
        Ok(Self::recent(&self.ratings, user_id, limit, |r| r.created_at))
    }

    async fn recent_comments(&self, user_id: UserId, limit: usize) -> Result<Vec<Comment>> {
        Ok(Self::recent(&self.comments, user_id, limit, |c| c.created_at))
    }

    async fn read_novel_ids(&self, user_id: UserId) -> Result<HashSet<NovelId>> {
        Ok(self
            .progress
            .get(&user_id)
            .map(|entries| entries.iter().map(|p| p.novel_id).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ClickCounterStore for MemoryCorpus {
    async fn increment(&self, novel_id: NovelId) -> Result<ClickCounters> {
        let _snapshot = self.shared();
        let mut novel = self
            .novels
            .get_mut(&novel_id)
            .filter(|n| n.is_approved())
            .ok_or_else(|| DiscoveryError::not_found("novel", novel_id))?;
        novel.clicks.increment();
        Ok(novel.clicks)
    }

    async fn reset(&self, window: ClickWindow) -> Result<u64> {
        let _epoch = self.exclusive();
        let mut touched = 0u64;
        for mut novel in self.novels.iter_mut() {
            novel.clicks.reset(window);
            touched += 1;
        }
        debug!(window = %window, rows = touched, "Reset in-memory click window");
        Ok(touched)
    }
}

#[async_trait]
impl SearchHistoryStore for MemoryCorpus {
    async fn record(&self, actor: &SearchActor, keyword: &str, at: DateTime<Utc>) -> Result<()> {
        let mut entry = self
            .search_history
            .entry((actor.key(), keyword.to_string()))
            .or_insert_with(|| SearchHistoryEntry {
                user_id: actor.user_id(),
                client_addr: match actor {
                    SearchActor::Anonymous(addr) => Some(addr.clone()),
                    SearchActor::User(_) => None,
                },
                keyword: keyword.to_string(),
                count: 0,
                last_seen: at,
            });
        entry.count += 1;
        entry.last_seen = entry.last_seen.max(at);
        Ok(())
    }

    async fn hot_keywords(&self, limit: usize) -> Result<Vec<HotKeyword>> {
        let mut ranked = self.keyword_totals();
        ranked.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| b.last_seen.cmp(&a.last_seen))
                .then_with(|| a.keyword.cmp(&b.keyword))
        });

        Ok(ranked
            .into_iter()
            .take(limit)
            .map(|k| HotKeyword {
                keyword: k.keyword,
                count: k.count,
            })
            .collect())
    }

    async fn user_history(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<SearchHistoryEntry>> {
        let mut entries: Vec<SearchHistoryEntry> = self
            .search_history
            .iter()
            .filter(|e| e.user_id == Some(user_id))
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by(|a, b| {
            b.last_seen
                .cmp(&a.last_seen)
                .then_with(|| a.keyword.cmp(&b.keyword))
        });
        entries.truncate(limit);
        Ok(entries)
    }

    async fn clear_user_history(&self, user_id: UserId) -> Result<u64> {
        let before = self.search_history.len();
        self.search_history.retain(|_, e| e.user_id != Some(user_id));
        Ok((before - self.search_history.len()) as u64)
    }

    async fn search_stats(&self, limit: usize) -> Result<SearchStats> {
        let mut recent = self.keyword_totals();
        let total_searches = recent.iter().map(|k| k.count).sum();
        let distinct_keywords = recent.len() as i64;
        recent.sort_by(|a, b| {
            b.last_seen
                .cmp(&a.last_seen)
                .then_with(|| a.keyword.cmp(&b.keyword))
        });
        recent.truncate(limit);

        Ok(SearchStats {
            total_searches,
            distinct_keywords,
            top_keywords: self.hot_keywords(limit).await?,
            recent_searches: recent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn approved(id: NovelId) -> Novel {
        Novel::new(id, format!("novel {}", id), "author", Utc::now())
            .approved()
            .with_word_count(1000)
    }

    #[tokio::test]
    async fn test_increment_requires_approval() {
        let corpus = MemoryCorpus::new();
        corpus.insert_novel(approved(1));
        corpus.insert_novel(Novel::new(2, "draft", "a", Utc::now()));

        let counters = corpus.increment(1).await.unwrap();
        assert_eq!(counters, ClickCounters::new(1, 1, 1, 1));
        assert!(corpus.increment(2).await.unwrap_err().is_not_found());
        assert!(corpus.increment(3).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_reset_touches_every_row() {
        let corpus = MemoryCorpus::new();
        corpus.insert_novel(approved(1).with_clicks(ClickCounters::new(10, 4, 5, 6)));
        corpus.insert_novel(approved(2));

        assert_eq!(corpus.reset(ClickWindow::Day).await.unwrap(), 2);
        let novel = corpus.novel(1).await.unwrap();
        assert_eq!(novel.clicks, ClickCounters::new(10, 0, 5, 6));
    }

    #[tokio::test]
    async fn test_rating_aggregates_follow_ratings() {
        let corpus = MemoryCorpus::new();
        corpus.insert_novel(approved(1));
        let now = Utc::now();
        corpus.add_rating(Rating::new(10, 1, 5, now).unwrap());
        corpus.add_rating(Rating::new(11, 1, 2, now).unwrap());
        // A second rating by the same user replaces the first.
        corpus.add_rating(Rating::new(10, 1, 4, now).unwrap());

        let novel = corpus.novel(1).await.unwrap();
        assert_eq!(novel.rating_count, 2);
        assert!((novel.average_rating - 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_content_falls_back_to_chapters() {
        let corpus = MemoryCorpus::new();
        corpus.insert_novel(approved(1).with_content_locator("novels/1.txt"));
        assert!(corpus.novel_content(1).await.unwrap_err().is_not_found());

        for position in 1..=2 {
            corpus
                .add_chapter(Chapter {
                    id: position as i64,
                    novel_id: 1,
                    title: format!("chapter {}", position),
                    position,
                    word_count: 10,
                    content_locator: format!("novels/1/{}.txt", position),
                })
                .unwrap();
            corpus.put_content(format!("novels/1/{}.txt", position), format!("part {}", position));
        }
        assert_eq!(corpus.novel_content(1).await.unwrap(), "part 1\npart 2");

        corpus.put_content("novels/1.txt", "whole book");
        assert_eq!(corpus.novel_content(1).await.unwrap(), "whole book");
    }

    #[tokio::test]
    async fn test_chapter_gap_is_rejected() {
        let corpus = MemoryCorpus::new();
        let chapter = Chapter {
            id: 1,
            novel_id: 1,
            title: "late".into(),
            position: 2,
            word_count: 10,
            content_locator: String::new(),
        };
        assert!(corpus.add_chapter(chapter).is_err());
    }

    #[tokio::test]
    async fn test_history_is_most_recent_first() {
        let corpus = MemoryCorpus::new();
        let now = Utc::now();
        for (novel_id, age) in [(1, 3), (2, 1), (3, 2)] {
            corpus.add_progress(ReadingProgress {
                user_id: 7,
                novel_id,
                chapter_id: None,
                position: 0,
                updated_at: now - Duration::hours(age),
            });
        }

        let recent = corpus.recent_reading(7, 2).await.unwrap();
        let ids: Vec<_> = recent.iter().map(|p| p.novel_id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(corpus.read_novel_ids(7).await.unwrap().len(), 3);
        assert!(corpus.read_novel_ids(8).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_history_counts_and_hot_words() {
        let corpus = MemoryCorpus::new();
        let now = Utc::now();
        let user = SearchActor::User(1);
        let anon = SearchActor::Anonymous("10.0.0.1".into());

        corpus.record(&user, "dragon", now).await.unwrap();
        corpus.record(&user, "dragon", now).await.unwrap();
        corpus.record(&anon, "dragon", now).await.unwrap();
        corpus.record(&anon, "city", now + Duration::seconds(1)).await.unwrap();
        corpus.record(&user, "sword", now).await.unwrap();

        let hot = corpus.hot_keywords(2).await.unwrap();
        assert_eq!(hot[0], HotKeyword { keyword: "dragon".into(), count: 3 });
        assert_eq!(hot[1].keyword, "city");

        let mine = corpus.user_history(1, 10).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|e| e.user_id == Some(1)));

        assert_eq!(corpus.clear_user_history(1).await.unwrap(), 2);
        assert!(corpus.user_history(1, 10).await.unwrap().is_empty());
        assert_eq!(corpus.hot_keywords(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_search_stats_totals_top_and_recent() {
        let corpus = MemoryCorpus::new();
        let now = Utc::now();
        let user = SearchActor::User(1);
        let anon = SearchActor::Anonymous("10.0.0.1".into());

        corpus.record(&user, "dragon", now).await.unwrap();
        corpus.record(&anon, "dragon", now).await.unwrap();
        corpus.record(&anon, "city", now + Duration::seconds(5)).await.unwrap();
        corpus.record(&user, "sword", now + Duration::seconds(2)).await.unwrap();

        let stats = corpus.search_stats(2).await.unwrap();
        assert_eq!(stats.total_searches, 4);
        assert_eq!(stats.distinct_keywords, 3);
        assert_eq!(stats.top_keywords[0].keyword, "dragon");
        assert_eq!(stats.top_keywords[0].count, 2);
        let recent: Vec<_> = stats.recent_searches.iter().map(|k| k.keyword.as_str()).collect();
        assert_eq!(recent, vec!["city", "sword"]);
    }

    #[test]
    fn test_categories_registered_from_novels() {
        let corpus = MemoryCorpus::new();
        corpus.insert_category(Category::new(5, "history"));
        corpus.insert_novel(
            approved(1).with_categories(vec![Category::new(2, "fantasy"), Category::new(5, "other")]),
        );

        let categories = tokio_test::block_on(corpus.categories()).unwrap();
        let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["fantasy", "history"]);
    }
}
