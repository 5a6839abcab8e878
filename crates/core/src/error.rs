//! Error kinds raised by the discovery engine
//!
//! Every engine component reports failures through [`DiscoveryError`]. The HTTP
//! layer maps the four kinds onto status codes; `Internal` details are logged
//! there and replaced with a generic message before leaving the process.

use std::fmt::Display;
use std::time::Duration;

/// Discovery engine error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DiscoveryError {
    /// Referenced entity does not exist, or is not approved where approval is required
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Parameter still out of range after clamping
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation exceeded its deadline
    #[error("operation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Unexpected failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl DiscoveryError {
    pub fn not_found(entity: &'static str, id: impl Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn internal(message: impl Display) -> Self {
        Self::Internal(message.to_string())
    }

    /// Short machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Timeout(_) => "timeout",
            Self::Internal(_) => "internal",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<sqlx::Error> for DiscoveryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::not_found("row", "query returned no rows"),
            other => Self::Internal(format!("database error: {}", other)),
        }
    }
}

impl From<serde_json::Error> for DiscoveryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization error: {}", err))
    }
}
