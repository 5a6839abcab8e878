//! Query facade: the single entry point HTTP handlers talk to
//!
//! Clamps caller parameters, applies the per-operation deadline, caches the
//! expensive list results and keeps the search index in step with approval
//! changes.

use chrono::{DateTime, Utc};
use novel_hub_core::{
    clamp_limit, retry_with_backoff, Board, CategoryId, ClickCounterStore, ClickCounters, Clock,
    CorpusStore, DiscoveryError, HistorySource, HotKeyword, Novel, NovelFilter, NovelId, Page,
    PageRequest, Result, RetryPolicy, SearchActor, SearchHistoryEntry, SearchHistoryStore,
    SearchStats, UserId, DEFAULT_LIMIT,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::{
    CacheStats, TtlCache, PREFIX_HOT_WORDS, PREFIX_NEW_BOOKS, PREFIX_POPULAR, PREFIX_RANKING,
};
use crate::clicks::{ClickAccountant, RolloverReport};
use crate::config::DiscoveryConfig;
use crate::ranking::RankingEngine;
use crate::recommendation::{RecommendationEngine, RecommendationKind, UserProfile};
use crate::search::autocomplete::{HISTORY_SUGGESTIONS, HOT_SUGGESTIONS, INDEX_SUGGESTIONS};
use crate::search::{merge_suggestions, ScoredHit, SearchIndex, Suggestion};

/// Served when the search history store is unavailable
pub const DEFAULT_HOT_WORDS: [&str; 8] = [
    "玄幻", "都市", "科幻", "言情", "武侠", "历史", "军事", "悬疑",
];

/// History rows scanned for suggestions and the history listing
const HISTORY_SCAN_LIMIT: usize = 100;

/// Which index a search runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Metadata,
    FullText,
}

impl FromStr for SearchMode {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "metadata" | "novel" | "novels" => Ok(Self::Metadata),
            "fulltext" | "full-text" | "full_text" | "content" => Ok(Self::FullText),
            other => Err(DiscoveryError::invalid(format!(
                "unknown search type: {}",
                other
            ))),
        }
    }
}

/// Narrowing applied to search hits before pagination
///
/// Rating bounds that are missing or not positive are ignored. When either
/// bound applies, unrated novels are left out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct SearchFilters {
    pub category_id: Option<CategoryId>,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
}

impl SearchFilters {
    pub fn matches(&self, novel: &Novel) -> bool {
        if let Some(category_id) = self.category_id {
            if !novel.categories.iter().any(|c| c.id == category_id) {
                return false;
            }
        }

        let min = self.min_score.filter(|v| *v > 0.0);
        let max = self.max_score.filter(|v| *v > 0.0);
        if min.is_none() && max.is_none() {
            return true;
        }
        novel.rating_count > 0
            && min.map_or(true, |m| novel.average_rating >= m)
            && max.map_or(true, |m| novel.average_rating <= m)
    }
}

/// Result of a full index rebuild
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub total_novels: usize,
    pub failed_count: usize,
}

/// Hit/miss counters of every facade cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheReport {
    pub rankings: CacheStats,
    pub popular: CacheStats,
    pub new_books: CacheStats,
    pub hot_words: CacheStats,
    pub profiles: CacheStats,
}

/// The store capabilities the facade is wired to
#[derive(Clone)]
pub struct Stores {
    pub corpus: Arc<dyn CorpusStore>,
    pub history: Arc<dyn HistorySource>,
    pub clicks: Arc<dyn ClickCounterStore>,
    pub search_history: Arc<dyn SearchHistoryStore>,
}

impl Stores {
    /// Uses one store for every capability
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: CorpusStore + HistorySource + ClickCounterStore + SearchHistoryStore + 'static,
    {
        Self {
            corpus: store.clone(),
            history: store.clone(),
            clicks: store.clone(),
            search_history: store,
        }
    }
}

pub struct QueryFacade {
    corpus: Arc<dyn CorpusStore>,
    search_history: Arc<dyn SearchHistoryStore>,
    index: Arc<SearchIndex>,
    clock: Arc<dyn Clock>,
    clicks: Arc<ClickAccountant>,
    ranking: RankingEngine,
    recommendations: RecommendationEngine,
    rankings_cache: TtlCache<Vec<Novel>>,
    popular_cache: TtlCache<Vec<Novel>>,
    new_books_cache: TtlCache<Vec<Novel>>,
    hot_words_cache: TtlCache<Vec<HotKeyword>>,
    timeout: Duration,
    page_size: usize,
    suggestion_limit: usize,
    ingest_retry: RetryPolicy,
}

impl QueryFacade {
    pub fn new(
        stores: Stores,
        index: Arc<SearchIndex>,
        clock: Arc<dyn Clock>,
        config: &DiscoveryConfig,
    ) -> Self {
        let ttl = |secs: u64| Duration::from_secs(secs);
        let clicks = Arc::new(ClickAccountant::new(
            stores.clicks,
            config.local_offset(),
            clock.now(),
        ));
        let recommendations = RecommendationEngine::new(
            Arc::clone(&stores.corpus),
            stores.history,
            Arc::clone(&clock),
            config.recommendation.clone(),
            ttl(config.cache.profile_ttl_sec),
            config.cache.max_entries,
        );
        let capacity = config.cache.max_entries;

        Self {
            ranking: RankingEngine::new(Arc::clone(&stores.corpus)),
            corpus: stores.corpus,
            search_history: stores.search_history,
            index,
            clock,
            clicks,
            recommendations,
            rankings_cache: TtlCache::new(PREFIX_RANKING, ttl(config.cache.ranking_ttl_sec))
                .with_max_entries(capacity),
            popular_cache: TtlCache::new(PREFIX_POPULAR, ttl(config.cache.popular_ttl_sec))
                .with_max_entries(capacity),
            new_books_cache: TtlCache::new(PREFIX_NEW_BOOKS, ttl(config.cache.new_books_ttl_sec))
                .with_max_entries(capacity),
            hot_words_cache: TtlCache::new(PREFIX_HOT_WORDS, ttl(config.cache.hot_words_ttl_sec))
                .with_max_entries(capacity),
            timeout: config.request_timeout(),
            page_size: config.search.page_size,
            suggestion_limit: config.search.suggestion_limit,
            ingest_retry: RetryPolicy::once(),
        }
    }

    /// Overrides the per-operation deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Accountant shared with the rollover scheduler
    pub fn click_accountant(&self) -> Arc<ClickAccountant> {
        Arc::clone(&self.clicks)
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    async fn within<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Operation exceeded its deadline"
                );
                Err(DiscoveryError::Timeout(self.timeout))
            }
        }
    }

    /// Metadata search, one page of approved novels
    #[instrument(skip(self, actor))]
    pub async fn search_novels(
        &self,
        query: &str,
        page: Option<i64>,
        size: Option<i64>,
        actor: &SearchActor,
    ) -> Result<Page<Novel>> {
        self.search(SearchMode::Metadata, query, page, size, actor)
            .await
    }

    /// Full-text search, one page of approved novels
    #[instrument(skip(self, actor))]
    pub async fn search_full_text(
        &self,
        query: &str,
        page: Option<i64>,
        size: Option<i64>,
        actor: &SearchActor,
    ) -> Result<Page<Novel>> {
        self.search(SearchMode::FullText, query, page, size, actor)
            .await
    }

    pub async fn search(
        &self,
        mode: SearchMode,
        query: &str,
        page: Option<i64>,
        size: Option<i64>,
        actor: &SearchActor,
    ) -> Result<Page<Novel>> {
        self.search_filtered(mode, query, &SearchFilters::default(), page, size, actor)
            .await
    }

    /// Search narrowed by category and average-rating bounds
    #[instrument(skip(self, actor))]
    pub async fn search_filtered(
        &self,
        mode: SearchMode,
        query: &str,
        filters: &SearchFilters,
        page: Option<i64>,
        size: Option<i64>,
        actor: &SearchActor,
    ) -> Result<Page<Novel>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(DiscoveryError::invalid("search keyword must not be empty"));
        }
        let request = PageRequest::clamped(page, size, self.page_size);

        let page = self
            .within("search", async {
                let hits = match mode {
                    SearchMode::Metadata => self.index.search_metadata(query).await,
                    SearchMode::FullText => self.index.search_content(query).await,
                };
                self.resolve(hits, filters, request).await
            })
            .await?;

        self.record_search(actor, query).await;
        Ok(page)
    }

    /// Loads the hits as approved novels matching `filters`, orders them by
    /// relevance, then current all-time clicks, then lower id, and cuts one page.
    ///
    /// `total` counts only hits that survive loading and filtering.
    async fn resolve(
        &self,
        hits: Vec<ScoredHit>,
        filters: &SearchFilters,
        request: PageRequest,
    ) -> Result<Page<Novel>> {
        let ids: Vec<NovelId> = hits.iter().map(|h| h.novel_id).collect();
        let mut novels: HashMap<NovelId, Novel> = self
            .corpus
            .approved_novels_by_id(&ids)
            .await?
            .into_iter()
            .map(|n| (n.id, n))
            .collect();

        let unapproved = hits.len().saturating_sub(novels.len());
        if unapproved > 0 {
            warn!(unapproved, "Indexed novels are no longer approved, skipping");
        }

        let mut ranked: Vec<(f32, Novel)> = hits
            .iter()
            .filter_map(|hit| novels.remove(&hit.novel_id).map(|n| (hit.score, n)))
            .filter(|(_, novel)| filters.matches(novel))
            .collect();
        ranked.sort_by(|(sa, a), (sb, b)| {
            sb.total_cmp(sa)
                .then_with(|| b.clicks.total.cmp(&a.clicks.total))
                .then_with(|| a.id.cmp(&b.id))
        });

        let total = ranked.len();
        let items = ranked
            .into_iter()
            .skip(request.offset())
            .take(request.size)
            .map(|(_, novel)| novel)
            .collect();
        Ok(Page::new(items, total, request))
    }

    async fn record_search(&self, actor: &SearchActor, keyword: &str) {
        if let Err(e) = self
            .search_history
            .record(actor, keyword, self.clock.now())
            .await
        {
            warn!(error = %e, "Failed to record search history");
        }
    }

    /// Merged history, index and hot-word suggestions
    #[instrument(skip(self, actor))]
    pub async fn suggestions(
        &self,
        query: &str,
        limit: Option<i64>,
        actor: &SearchActor,
    ) -> Result<Vec<Suggestion>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let limit = clamp_limit(limit, self.suggestion_limit);

        let history = match actor.user_id() {
            Some(user_id) => match self
                .within(
                    "suggestion_history",
                    self.search_history.user_history(user_id, HISTORY_SCAN_LIMIT),
                )
                .await
            {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(error = %e, "Search history unavailable for suggestions");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let indexed = self
            .within("suggest", async {
                Ok(self.index.suggest(query, INDEX_SUGGESTIONS).await)
            })
            .await?;
        let hot = self.hot_words(Some(HOT_SUGGESTIONS as i64)).await;

        let merged = merge_suggestions(query, &history, indexed, &hot, limit);
        debug!(
            history = history.len().min(HISTORY_SUGGESTIONS),
            returned = merged.len(),
            "Suggestions merged"
        );
        Ok(merged)
    }

    /// Most searched keywords; a built-in list when history is unavailable
    #[instrument(skip(self))]
    pub async fn hot_words(&self, limit: Option<i64>) -> Vec<HotKeyword> {
        let limit = clamp_limit(limit, DEFAULT_LIMIT);
        let key = TtlCache::<Vec<HotKeyword>>::generate_key(PREFIX_HOT_WORDS, &limit);

        let result = self
            .hot_words_cache
            .get_or_try_insert_with(key, || {
                self.within("hot_words", self.search_history.hot_keywords(limit))
            })
            .await;

        match result {
            Ok(words) => (*words).clone(),
            Err(e) => {
                warn!(error = %e, "Hot keywords unavailable, serving defaults");
                default_hot_words(limit)
            }
        }
    }

    /// The caller's own search history, newest first
    #[instrument(skip(self))]
    pub async fn search_history(
        &self,
        user_id: UserId,
        page: Option<i64>,
        size: Option<i64>,
    ) -> Result<Page<SearchHistoryEntry>> {
        let request = PageRequest::clamped(page, size, self.page_size);
        let entries = self
            .within(
                "search_history",
                self.search_history.user_history(user_id, HISTORY_SCAN_LIMIT),
            )
            .await?;
        Ok(Page::new(request.slice(&entries), entries.len(), request))
    }

    /// Site-wide search totals with the top and latest keywords
    #[instrument(skip(self))]
    pub async fn search_stats(&self, limit: Option<i64>) -> Result<SearchStats> {
        let limit = clamp_limit(limit, DEFAULT_LIMIT);
        self.within("search_stats", self.search_history.search_stats(limit))
            .await
    }

    #[instrument(skip(self))]
    pub async fn clear_search_history(&self, user_id: UserId) -> Result<u64> {
        let removed = self
            .within(
                "clear_search_history",
                self.search_history.clear_user_history(user_id),
            )
            .await?;
        info!(user_id, removed, "Search history cleared");
        Ok(removed)
    }

    #[instrument(skip(self))]
    pub async fn rankings(
        &self,
        board: Board,
        limit: Option<i64>,
        category_id: Option<CategoryId>,
    ) -> Result<Arc<Vec<Novel>>> {
        let limit = clamp_limit(limit, DEFAULT_LIMIT);
        let key = TtlCache::<Vec<Novel>>::generate_key(
            PREFIX_RANKING,
            &(board.as_str(), limit, category_id),
        );
        self.rankings_cache
            .get_or_try_insert_with(key, || {
                self.within("rankings", self.ranking.top(board, limit, category_id))
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn recommendations(
        &self,
        kind: RecommendationKind,
        novel_id: Option<NovelId>,
        limit: Option<i64>,
    ) -> Result<Arc<Vec<Novel>>> {
        let limit = clamp_limit(limit, DEFAULT_LIMIT);
        match kind {
            RecommendationKind::Popular => {
                let key = TtlCache::<Vec<Novel>>::generate_key(PREFIX_POPULAR, &limit);
                self.popular_cache
                    .get_or_try_insert_with(key, || {
                        self.within("popular", self.recommendations.popular(limit))
                    })
                    .await
            }
            RecommendationKind::New => {
                let key = TtlCache::<Vec<Novel>>::generate_key(PREFIX_NEW_BOOKS, &limit);
                self.new_books_cache
                    .get_or_try_insert_with(key, || {
                        self.within("new_books", self.recommendations.new_books(limit))
                    })
                    .await
            }
            RecommendationKind::Similar => {
                let novel_id = novel_id.ok_or_else(|| {
                    DiscoveryError::invalid("novel_id is required for similar recommendations")
                })?;
                let similar = self
                    .within("similar", self.recommendations.similar(novel_id, limit))
                    .await?;
                Ok(Arc::new(similar))
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn personalized(&self, user_id: UserId, limit: Option<i64>) -> Result<Vec<Novel>> {
        let limit = clamp_limit(limit, DEFAULT_LIMIT);
        self.within(
            "personalized",
            self.recommendations.personalized(user_id, limit),
        )
        .await
    }

    pub async fn profile(&self, user_id: UserId) -> Result<Arc<UserProfile>> {
        self.within("profile", self.recommendations.profile(user_id))
            .await
    }

    #[instrument(skip(self))]
    pub async fn record_click(&self, novel_id: NovelId) -> Result<ClickCounters> {
        self.within("record_click", self.clicks.record(novel_id))
            .await
    }

    /// Resets rolled-over windows and drops cached boards built from them
    #[instrument(skip(self))]
    pub async fn rollover(&self, now: DateTime<Utc>) -> Result<RolloverReport> {
        let report = self.clicks.rollover(now).await?;
        if !report.reset.is_empty() {
            self.rankings_cache.clear();
        }
        Ok(report)
    }

    /// Write-path hook for a new rating, comment or reading progress entry:
    /// the user's cached profile is rebuilt on next use
    pub fn on_reader_activity(&self, user_id: UserId) {
        self.recommendations.forget_profile(user_id);
        debug!(user_id, "Cached profile dropped after reader activity");
    }

    /// Write-path hook for a newly approved novel; failures are logged
    pub async fn on_novel_approved(&self, novel_id: NovelId) {
        if let Err(e) = self.reindex(novel_id).await {
            error!(novel_id, error = %e, "Indexing approved novel failed");
        }
    }

    /// Write-path hook for a rejected or deleted novel; failures are logged
    #[instrument(skip(self))]
    pub async fn on_novel_removed(&self, novel_id: NovelId) {
        let removed = retry_with_backoff(
            || self.index.delete_novel(novel_id),
            self.ingest_retry.clone(),
            |_| true,
        )
        .await;
        match removed {
            Ok(()) => info!(novel_id, "Novel removed from search"),
            Err(e) => error!(novel_id, error = %e, "Removing novel from search failed"),
        }
        self.invalidate_lists();
    }

    /// Re-indexes one approved novel's metadata and content
    #[instrument(skip(self))]
    pub async fn reindex(&self, novel_id: NovelId) -> Result<()> {
        let novel = self.corpus.approved_novel(novel_id).await?;
        self.ingest(&novel).await?;
        self.invalidate_lists();
        info!(novel_id, "Novel indexed");
        Ok(())
    }

    /// Re-indexes every approved novel, counting failures
    #[instrument(skip(self))]
    pub async fn rebuild_index(&self) -> Result<RebuildReport> {
        let novels = self.corpus.approved_novels(&NovelFilter::default()).await?;
        let mut report = RebuildReport {
            total_novels: novels.len(),
            failed_count: 0,
        };

        for novel in &novels {
            if let Err(e) = self.ingest(novel).await {
                error!(novel_id = novel.id, error = %e, "Rebuild failed for novel");
                report.failed_count += 1;
            }
        }
        self.invalidate_lists();

        info!(
            total = report.total_novels,
            failed = report.failed_count,
            "Search index rebuilt"
        );
        Ok(report)
    }

    /// Writes both documents, retrying each once.
    ///
    /// A failed write leaves the previous document in place.
    async fn ingest(&self, novel: &Novel) -> Result<()> {
        retry_with_backoff(
            || self.index.index_novel(novel),
            self.ingest_retry.clone(),
            |_| true,
        )
        .await?;

        match self.corpus.novel_content(novel.id).await {
            Ok(text) => {
                retry_with_backoff(
                    || self.index.index_content(novel.id, &text),
                    self.ingest_retry.clone(),
                    |_| true,
                )
                .await?;
            }
            Err(e) if e.is_not_found() => {
                debug!(novel_id = novel.id, "Novel has no content to index");
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn invalidate_lists(&self) {
        self.rankings_cache.clear();
        self.popular_cache.clear();
        self.new_books_cache.clear();
    }

    pub fn cache_stats(&self) -> CacheReport {
        CacheReport {
            rankings: self.rankings_cache.stats(),
            popular: self.popular_cache.stats(),
            new_books: self.new_books_cache.stats(),
            hot_words: self.hot_words_cache.stats(),
            profiles: self.recommendations.profile_stats(),
        }
    }
}

fn default_hot_words(limit: usize) -> Vec<HotKeyword> {
    DEFAULT_HOT_WORDS
        .iter()
        .take(limit)
        .map(|word| HotKeyword {
            keyword: (*word).to_string(),
            count: 0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_mode_aliases() {
        assert_eq!("fulltext".parse::<SearchMode>().unwrap(), SearchMode::FullText);
        assert_eq!("full-text".parse::<SearchMode>().unwrap(), SearchMode::FullText);
        assert_eq!("".parse::<SearchMode>().unwrap(), SearchMode::Metadata);
        assert!("vector".parse::<SearchMode>().is_err());
    }

    #[test]
    fn test_default_hot_words_respect_limit() {
        assert_eq!(default_hot_words(3).len(), 3);
        assert_eq!(default_hot_words(50).len(), DEFAULT_HOT_WORDS.len());
        assert_eq!(default_hot_words(1)[0].keyword, "玄幻");
    }

    fn rated(average: f64, count: i64) -> Novel {
        Novel::new(1, "t", "a", Utc::now())
            .approved()
            .with_categories(vec![novel_hub_core::Category::new(4, "仙侠")])
            .with_rating(average, count)
    }

    #[test]
    fn test_filters_by_category() {
        let filters = SearchFilters {
            category_id: Some(4),
            ..Default::default()
        };
        assert!(filters.matches(&rated(0.0, 0)));

        let other = SearchFilters {
            category_id: Some(5),
            ..Default::default()
        };
        assert!(!other.matches(&rated(4.0, 3)));
    }

    #[test]
    fn test_filters_by_rating_bounds() {
        let filters = SearchFilters {
            min_score: Some(3.0),
            max_score: Some(4.5),
            ..Default::default()
        };
        assert!(filters.matches(&rated(3.0, 2)));
        assert!(filters.matches(&rated(4.5, 2)));
        assert!(!filters.matches(&rated(2.9, 2)));
        assert!(!filters.matches(&rated(4.6, 2)));
        assert!(!filters.matches(&rated(0.0, 0)));
    }

    #[test]
    fn test_non_positive_bounds_are_ignored() {
        let filters = SearchFilters {
            min_score: Some(0.0),
            max_score: Some(-1.0),
            ..Default::default()
        };
        assert!(filters.matches(&rated(0.0, 0)));
    }
}
