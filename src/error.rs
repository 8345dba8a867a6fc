//! Error types
//!
//! `GatewayError` is what a storage provider call can fail with. `ApiError` is the
//! crate-level error; its replication variants are the fatal ones that unwind out
//! of a run. Per-node failures are recorded in the run result instead.

use crate::types::NodeId;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single storage gateway call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("transient network error: {0}")]
    Transient(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl GatewayError {
    /// Rate limiting and transient network failures may succeed on retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GatewayError::RateLimited { .. } | GatewayError::Transient(_)
        )
    }

    /// Provider-suggested wait before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GatewayError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        GatewayError::RateLimited {
            message: message.into(),
            retry_after: None,
        }
    }
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The source tree could not be read; nothing has been created.
    #[error("failed to read source folder {folder_id}: {source}")]
    SourceRead {
        folder_id: NodeId,
        #[source]
        source: GatewayError,
    },

    /// The provider returned a tree that is not a single-parent forest.
    #[error("malformed source tree: {0}")]
    MalformedTree(String),

    /// The destination root folder could not be created; no steps were attempted.
    #[error("failed to create workspace root '{name}': {source}")]
    RootCreation {
        name: String,
        #[source]
        source: GatewayError,
    },

    #[error("invalid replication plan: {0}")]
    InvalidPlan(String),

    #[error("storage gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::ConfigError(format!("I/O error: {}", err))
    }
}
