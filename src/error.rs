//! Error types for the cache engine
//!
//! Every variant here is absorbed by the engine and only surfaces through logs,
//! metrics, or the admin API. Loader errors belong to the caller and are never
//! wrapped in this type.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The far cache could not be reached or rejected the command
    #[error("Far cache unavailable: {0}")]
    FarStore(String),

    /// A far cache call exceeded the configured timeout
    #[error("Far cache timed out after {0:?}")]
    FarStoreTimeout(Duration),

    /// A value could not be encoded for storage
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// A stored value could not be decoded
    #[error("Deserialization failed: {0}")]
    Deserialization(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// True for the errors that mean "the far layer is absent right now".
    pub fn is_far_unavailable(&self) -> bool {
        matches!(self, CacheError::FarStore(_) | CacheError::FarStoreTimeout(_))
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::FarStore(err.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::FarStore(_) | CacheError::FarStoreTimeout(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            CacheError::Serialization(_)
            | CacheError::Deserialization(_)
            | CacheError::Config(_)
            | CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
