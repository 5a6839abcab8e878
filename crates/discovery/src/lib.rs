pub mod cache;
pub mod clicks;
pub mod config;
pub mod corpus;
pub mod facade;
pub mod ranking;
pub mod recommendation;
pub mod search;
pub mod server;

pub use cache::{CacheStats, TtlCache};
pub use clicks::{run_rollover_task, ClickAccountant, RolloverReport};
pub use config::DiscoveryConfig;
pub use corpus::{MemoryCorpus, PgCorpus};
pub use facade::{CacheReport, QueryFacade, RebuildReport, SearchFilters, SearchMode, Stores};
pub use ranking::RankingEngine;
pub use recommendation::{RecommendationEngine, RecommendationKind, UserProfile};
pub use search::{hit_ids, ScoredHit, SearchIndex, Suggestion, SuggestionType};

use novel_hub_core::{Clock, SystemClock};
use std::sync::Arc;
use tracing::{info, warn};

/// Initialize discovery service components
///
/// Connects the PostgreSQL corpus when one is configured and falls back to an
/// empty in-memory corpus otherwise.
pub async fn init_service(config: Arc<DiscoveryConfig>) -> anyhow::Result<Arc<QueryFacade>> {
    let stores = match &config.database {
        Some(db) => {
            let corpus = PgCorpus::connect(db).await?;
            corpus.migrate().await?;
            info!("Using PostgreSQL corpus store");
            Stores::shared(Arc::new(corpus))
        }
        None => {
            warn!("No database configured, using an empty in-memory corpus");
            Stores::shared(Arc::new(MemoryCorpus::default()))
        }
    };

    let index = Arc::new(SearchIndex::open(
        &config.search.index_dir,
        config.search.writer_memory_bytes,
    )?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let facade = Arc::new(QueryFacade::new(stores, index, clock, &config));

    let (novels, contents) = facade.index().document_counts();
    info!(novels, contents, "Search index opened");
    if novels == 0 {
        let report = facade.rebuild_index().await?;
        info!(
            total = report.total_novels,
            failed = report.failed_count,
            "Initial index build completed"
        );
    }

    Ok(facade)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_service_initialization_without_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DiscoveryConfig::default();
        config.search.index_dir = dir.path().to_string_lossy().into_owned();

        let facade = init_service(Arc::new(config)).await.unwrap();
        assert_eq!(facade.index().document_counts(), (0, 0));
    }
}
