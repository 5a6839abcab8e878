use chrono::{FixedOffset, Offset, Utc};
use novel_hub_core::{ConfigLoader, DatabaseConfig, LogConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::recommendation::SimilarSortKey;

/// Discovery Service Configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Search index configuration
    pub search: SearchConfig,

    /// Result cache configuration
    pub cache: CacheConfig,

    /// Click accounting configuration
    pub clicks: ClicksConfig,

    /// Recommendation tuning
    pub recommendation: RecommendationConfig,

    /// Per-request limits
    pub request: RequestConfig,

    /// PostgreSQL corpus store; the in-memory store is used when absent
    pub database: Option<DatabaseConfig>,

    /// Logging configuration
    pub logging: LogConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host
    pub host: String,

    /// Server port (default: 8080)
    pub port: u16,

    /// Worker threads
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Directory holding the metadata and content indexes
    pub index_dir: String,

    /// Memory budget of each index writer in bytes
    pub writer_memory_bytes: usize,

    /// Default page size
    pub page_size: usize,

    /// Default number of suggestions
    pub suggestion_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            index_dir: "./data/search-index".to_string(),
            writer_memory_bytes: 50_000_000,
            page_size: 10,
            suggestion_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache TTL for ranking boards (seconds)
    pub ranking_ttl_sec: u64,

    /// Cache TTL for popular recommendations (seconds)
    pub popular_ttl_sec: u64,

    /// Cache TTL for new-book recommendations (seconds)
    pub new_books_ttl_sec: u64,

    /// Cache TTL for hot search words (seconds)
    pub hot_words_ttl_sec: u64,

    /// Cache TTL for derived user profiles (seconds)
    pub profile_ttl_sec: u64,

    /// Entry capacity of each cache
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ranking_ttl_sec: 300,
            popular_ttl_sec: 300,
            new_books_ttl_sec: 300,
            hot_words_ttl_sec: 3600,
            profile_ttl_sec: 300,
            max_entries: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClicksConfig {
    /// Offset of the site's local time from UTC, in hours
    pub utc_offset_hours: i32,

    /// Run the midnight rollover task inside this process
    pub run_scheduler: bool,
}

impl Default for ClicksConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: 8,
            run_scheduler: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RecommendationConfig {
    /// Candidates at or below this similarity are discarded
    pub similarity_threshold: f64,

    /// Ordering of similar-novel survivors
    pub similar_sort: SimilarSortKey,

    /// Upload window for new books, in days
    pub new_book_window_days: i64,

    /// Minimum average rating for a new book
    pub new_book_min_rating: f64,

    /// Alternative minimum rating count for a new book
    pub new_book_min_ratings: i64,

    /// History entries read per source when profiling a user
    pub history_depth: usize,

    /// Number of preferred categories kept in a profile
    pub preferred_categories: usize,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
            similar_sort: SimilarSortKey::Clicks,
            new_book_window_days: 7,
            new_book_min_rating: 3.0,
            new_book_min_ratings: 5,
            history_depth: 20,
            preferred_categories: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Deadline of one facade operation in milliseconds
    pub timeout_ms: u64,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self { timeout_ms: 5000 }
    }
}

impl DiscoveryConfig {
    /// Load configuration from environment and config file
    ///
    /// Environment variables use the `NOVEL_HUB` prefix with `__` between
    /// sections, e.g. `NOVEL_HUB__SERVER__PORT=9000`.
    pub fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/discovery").required(false))
            .add_source(
                config::Environment::with_prefix("NOVEL_HUB")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let mut loaded: Self = settings.try_deserialize()?;
        if loaded.database.is_none() {
            loaded.database = DatabaseConfig::from_env().ok();
        }
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.search.page_size == 0 || self.search.suggestion_limit == 0 {
            anyhow::bail!("search page_size and suggestion_limit must be greater than 0");
        }
        if self.search.writer_memory_bytes < 20_000_000 {
            anyhow::bail!("search writer_memory_bytes must be at least 20000000");
        }
        let c = &self.cache;
        if [
            c.ranking_ttl_sec,
            c.popular_ttl_sec,
            c.new_books_ttl_sec,
            c.hot_words_ttl_sec,
            c.profile_ttl_sec,
        ]
        .contains(&0)
        {
            anyhow::bail!("cache TTLs must be greater than 0");
        }
        if c.max_entries == 0 {
            anyhow::bail!("cache max_entries must be greater than 0");
        }
        if !(-12..=14).contains(&self.clicks.utc_offset_hours) {
            anyhow::bail!("clicks utc_offset_hours must be between -12 and 14");
        }
        if !(0.0..=1.0).contains(&self.recommendation.similarity_threshold) {
            anyhow::bail!("recommendation similarity_threshold must be between 0.0 and 1.0");
        }
        if self.recommendation.new_book_window_days <= 0 {
            anyhow::bail!("recommendation new_book_window_days must be positive");
        }
        if self.request.timeout_ms == 0 {
            anyhow::bail!("request timeout_ms must be greater than 0");
        }
        if let Some(db) = &self.database {
            db.validate()?;
        }
        Ok(())
    }

    /// Deadline of one facade operation
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request.timeout_ms)
    }

    /// The site's local time zone
    pub fn local_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.clicks.utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DiscoveryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8080);
        assert!(config.database.is_none());
    }

    #[test]
    fn test_rejects_zero_ttl() {
        let mut config = DiscoveryConfig::default();
        config.cache.ranking_ttl_sec = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_cache_capacity() {
        let mut config = DiscoveryConfig::default();
        config.cache.max_entries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_out_of_range_offset() {
        let mut config = DiscoveryConfig::default();
        config.clicks.utc_offset_hours = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_local_offset() {
        let mut config = DiscoveryConfig::default();
        config.clicks.utc_offset_hours = -5;
        assert_eq!(config.local_offset().local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: DiscoveryConfig =
            serde_json::from_str(r#"{"server":{"port":9000},"search":{"page_size":20}}"#)
                .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.search.page_size, 20);
        assert_eq!(config.cache.hot_words_ttl_sec, 3600);
    }
}
