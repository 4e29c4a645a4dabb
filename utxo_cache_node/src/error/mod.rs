// Error handling module for the UTXO cache node
//
// Wraps token cache failures together with the node's own configuration,
// storage and serialization failures, and maps each onto an HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::io;
use std::result;
use thiserror::Error;
use utxo_token_cache::TokenCacheError;

/// Result type for cache node operations
pub type Result<T> = result::Result<T, NodeError>;

/// Error type for cache node operations
#[derive(Debug, Error)]
pub enum NodeError {
    /// Failure reported by the token cache
    #[error(transparent)]
    Cache(#[from] TokenCacheError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization-related errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO errors
    #[error("IO error: {0}")]
    IO(String),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(String),
}

impl NodeError {
    /// HTTP status reported for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            NodeError::Cache(err) => match err {
                TokenCacheError::InsufficientBalance { .. }
                | TokenCacheError::DuplicateClaim(_)
                | TokenCacheError::TokenAlreadyClaimed { .. } => StatusCode::CONFLICT,
                TokenCacheError::PoolKeyTooLong { .. }
                | TokenCacheError::InvalidTagFilter(_)
                | TokenCacheError::InvalidClaimQuery(_) => StatusCode::BAD_REQUEST,
                TokenCacheError::Persistence(_) | TokenCacheError::PoolUnavailable(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                TokenCacheError::Codec(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            NodeError::Json(_) => StatusCode::BAD_REQUEST,
            NodeError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            NodeError::Config(_) | NodeError::Serialization(_) | NodeError::IO(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Implement IntoResponse for NodeError so it can be returned directly from handlers
impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = Json(serde_json::json!({
            "error": {
                "code": status.as_u16(),
                "message": self.to_string()
            }
        }));

        (status, body).into_response()
    }
}

impl From<rusqlite::Error> for NodeError {
    fn from(err: rusqlite::Error) -> Self {
        NodeError::Database(err.to_string())
    }
}

impl From<io::Error> for NodeError {
    fn from(err: io::Error) -> Self {
        NodeError::IO(err.to_string())
    }
}

impl From<::config::ConfigError> for NodeError {
    fn from(err: ::config::ConfigError) -> Self {
        NodeError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for NodeError {
    fn from(err: toml::ser::Error) -> Self {
        NodeError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for NodeError {
    fn from(err: serde_json::Error) -> Self {
        NodeError::Json(err.to_string())
    }
}
