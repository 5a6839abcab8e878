//! Structured logging initialization
//!
//! Services call [`init_logging`] once at startup. `RUST_LOG` overrides the
//! configured level when set.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("Invalid log filter '{0}': {1}")]
    InvalidFilter(String, String),

    #[error("Failed to initialize tracing subscriber: {0}")]
    SubscriberInit(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event
    #[default]
    Json,
    /// Human-readable multi-line output
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive, e.g. `info` or `novel_hub_discovery=debug`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl LogConfig {
    fn env_filter(&self) -> Result<EnvFilter, ObservabilityError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.level)
                .map_err(|e| ObservabilityError::InvalidFilter(self.level.clone(), e.to_string())),
        }
    }
}

/// Installs the global tracing subscriber
pub fn init_logging(config: &LogConfig) -> Result<(), ObservabilityError> {
    let filter = config.env_filter()?;
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_line_number(true),
            )
            .try_init(),
    }
    .map_err(|e| ObservabilityError::SubscriberInit(e.to_string()))?;

    tracing::info!(level = %config.level, format = ?config.format, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_format_deserializes_lowercase() {
        let config: LogConfig =
            serde_json::from_str(r#"{"level":"debug","format":"pretty"}"#).unwrap();
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.level, "debug");
    }
}
