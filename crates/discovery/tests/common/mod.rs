//! Shared fixtures for discovery integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use novel_hub_core::{
    Category, ClickCounters, Clock, CorpusStore, FixedClock, Keyword, Novel, NovelFilter, NovelId,
    Result,
};
use novel_hub_discovery::{DiscoveryConfig, MemoryCorpus, QueryFacade, SearchIndex, Stores};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Corpus whose reads stall for a fixed delay before reaching the inner store
pub struct SlowCorpus {
    pub inner: Arc<MemoryCorpus>,
    pub delay: Duration,
}

#[async_trait]
impl CorpusStore for SlowCorpus {
    async fn novel(&self, id: NovelId) -> Result<Novel> {
        tokio::time::sleep(self.delay).await;
        self.inner.novel(id).await
    }

    async fn approved_novels(&self, filter: &NovelFilter) -> Result<Vec<Novel>> {
        tokio::time::sleep(self.delay).await;
        self.inner.approved_novels(filter).await
    }

    async fn novel_content(&self, id: NovelId) -> Result<String> {
        self.inner.novel_content(id).await
    }

    async fn categories(&self) -> Result<Vec<Category>> {
        self.inner.categories().await
    }
}

pub struct Harness {
    pub store: Arc<MemoryCorpus>,
    pub clock: Arc<FixedClock>,
    pub facade: Arc<QueryFacade>,
    pub config: Arc<DiscoveryConfig>,
    // Keeps the index directory alive for the lifetime of the harness
    pub dir: TempDir,
}

impl Harness {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_config(now, DiscoveryConfig::default())
    }

    pub fn with_config(now: DateTime<Utc>, config: DiscoveryConfig) -> Self {
        Self::build(now, config, None)
    }

    /// Corpus reads take `delay`; the facade gives up after `timeout`
    pub fn slow(now: DateTime<Utc>, delay: Duration, timeout: Duration) -> Self {
        Self::build(now, DiscoveryConfig::default(), Some((delay, timeout)))
    }

    fn build(
        now: DateTime<Utc>,
        mut config: DiscoveryConfig,
        slow: Option<(Duration, Duration)>,
    ) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        config.search.index_dir = dir.path().to_string_lossy().into_owned();

        let store = Arc::new(MemoryCorpus::default());
        let clock = Arc::new(FixedClock::new(now));
        let index = Arc::new(
            SearchIndex::open(dir.path(), config.search.writer_memory_bytes).expect("open index"),
        );
        let shared_clock: Arc<dyn Clock> = clock.clone();
        let mut stores = Stores::shared(store.clone());
        if let Some((delay, _)) = slow {
            stores.corpus = Arc::new(SlowCorpus {
                inner: store.clone(),
                delay,
            });
        }
        let mut facade = QueryFacade::new(stores, index, shared_clock, &config);
        if let Some((_, timeout)) = slow {
            facade = facade.with_timeout(timeout);
        }
        let facade = Arc::new(facade);

        Self {
            store,
            clock,
            facade,
            config: Arc::new(config),
            dir,
        }
    }

    /// Inserts the novel and indexes it when approved
    pub async fn publish(&self, novel: Novel) {
        let id = novel.id;
        let approved = novel.is_approved();
        self.store.insert_novel(novel);
        if approved {
            self.facade.reindex(id).await.expect("reindex");
        }
    }
}

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

pub fn category(id: i64, name: &str) -> Category {
    Category::new(id, name)
}

pub fn keywords(words: &[&str]) -> Vec<Keyword> {
    words
        .iter()
        .enumerate()
        .map(|(i, w)| Keyword::new(i as i64 + 1, *w))
        .collect()
}

pub fn novel(id: NovelId, title: &str, author: &str, uploaded_at: DateTime<Utc>) -> Novel {
    Novel::new(id, title, author, uploaded_at).approved()
}

pub fn clicks(total: i64, today: i64, week: i64, month: i64) -> ClickCounters {
    ClickCounters::new(total, today, week, month)
}

pub fn ids(novels: &[Novel]) -> Vec<NovelId> {
    novels.iter().map(|n| n.id).collect()
}
