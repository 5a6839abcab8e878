//! # Novel Hub Core
//!
//! Shared types for the Novel Hub content discovery service.
//!
//! ## Modules
//!
//! - `models`: Novels, chapters, taxonomy, reader activity and click counters
//! - `error`: The discovery error kinds
//! - `ports`: Store capabilities the engine consumes
//! - `clock`: Injectable wall clock
//! - `config`: Environment configuration helpers
//! - `observability`: Structured logging
//! - `pagination`: Page clamping and paged results
//! - `retry`: Backoff retry utilities

pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod observability;
pub mod pagination;
pub mod ports;
pub mod retry;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{load_dotenv, ConfigError, ConfigLoader, DatabaseConfig};
pub use error::DiscoveryError;
pub use models::*;
pub use observability::{init_logging, LogConfig, LogFormat, ObservabilityError};
pub use pagination::{
    clamp_limit, clamp_page, Page, PageRequest, DEFAULT_LIMIT, MAX_LIMIT,
};
pub use ports::{ClickCounterStore, CorpusStore, HistorySource, NovelFilter, SearchHistoryStore};
pub use retry::{retry_with_backoff, RetryPolicy};

/// Result type alias for discovery operations
pub type Result<T> = std::result::Result<T, DiscoveryError>;
