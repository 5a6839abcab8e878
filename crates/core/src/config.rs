//! Shared configuration helpers
//!
//! Environment variables use the `NOVEL_HUB_` prefix. `.env` files are honoured
//! through [`load_dotenv`], with real environment variables taking precedence.
//!
//! # Example
//!
//! ```no_run
//! use novel_hub_core::config::{load_dotenv, ConfigLoader, DatabaseConfig};
//!
//! load_dotenv();
//! let db = DatabaseConfig::from_env().expect("database settings");
//! db.validate().expect("valid database settings");
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration value: {0}")]
    Missing(String),

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Environment-driven configuration section
pub trait ConfigLoader: Sized {
    fn from_env() -> Result<Self, ConfigError>;

    fn validate(&self) -> Result<(), ConfigError>;
}

/// Loads `.env` from the working directory if present
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Failed to read .env file"),
    }
}

/// PostgreSQL connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_sec: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/novel_hub".to_string(),
            max_connections: 10,
            connect_timeout_sec: 10,
        }
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_sec)
    }
}

impl ConfigLoader for DatabaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("NOVEL_HUB_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .map_err(|_| ConfigError::Missing("DATABASE_URL".to_string()))?;

        let defaults = Self::default();
        Ok(Self {
            url,
            max_connections: parse_env_var(
                "NOVEL_HUB_DATABASE_MAX_CONNECTIONS",
                defaults.max_connections,
            )?,
            connect_timeout_sec: parse_env_var(
                "NOVEL_HUB_DATABASE_CONNECT_TIMEOUT",
                defaults.connect_timeout_sec,
            )?,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.url.starts_with("postgres://") || self.url.starts_with("postgresql://")) {
            return Err(ConfigError::Invalid {
                key: "database.url".to_string(),
                message: "must start with postgres:// or postgresql://".to_string(),
            });
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "database.max_connections".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if self.connect_timeout_sec == 0 {
            return Err(ConfigError::Invalid {
                key: "database.connect_timeout_sec".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Parses an optional environment variable, falling back to `default`
pub fn parse_env_var<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
            key: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_database_config_is_valid() {
        assert!(DatabaseConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_postgres_url() {
        let config = DatabaseConfig {
            url: "mysql://localhost/db".to_string(),
            ..DatabaseConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_pool() {
        let config = DatabaseConfig {
            max_connections: 0,
            ..DatabaseConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_env_var_default_when_unset() {
        let value: u32 = parse_env_var("NOVEL_HUB_TEST_UNSET_VARIABLE_XYZ", 7).unwrap();
        assert_eq!(value, 7);
    }
}
