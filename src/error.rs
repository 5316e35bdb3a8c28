use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Core error taxonomy shared by storage, capture and query paths
#[derive(Debug, Error)]
pub enum TelescopeError {
    /// Backend unreachable or erroring
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    /// Entry id absent; normally surfaced as `Ok(None)` instead
    #[error("Not found: {0}")]
    NotFound(String),
    /// Malformed pagination or filter input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Adapter-local failure, always absorbed by the capture layer
    #[error("Capture failure: {0}")]
    CaptureFailure(String),
}

pub type Result<T, E = TelescopeError> = std::result::Result<T, E>;

impl From<sqlx::Error> for TelescopeError {
    fn from(err: sqlx::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for TelescopeError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::StorageUnavailable(format!("migration failed: {}", err))
    }
}

impl From<serde_json::Error> for TelescopeError {
    fn from(err: serde_json::Error) -> Self {
        Self::StorageUnavailable(format!("corrupt entry document: {}", err))
    }
}

impl From<std::io::Error> for TelescopeError {
    fn from(err: std::io::Error) -> Self {
        Self::CaptureFailure(err.to_string())
    }
}

/// HTTP-facing error type
#[derive(Debug)]
pub enum AppError {
    /// Malformed query parameters
    BadRequest(String),
    /// Entry does not exist
    NotFound(String),
    /// Storage backend failure
    StorageError(String),
    /// Internal server error
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            Self::NotFound(msg) => write!(f, "Not found: {}", msg),
            Self::StorageError(msg) => write!(f, "Storage error: {}", msg),
            Self::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::StorageError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            Self::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "type": error_type_name(&self),
            }
        }));

        (status, body).into_response()
    }
}

fn error_type_name(error: &AppError) -> &'static str {
    match error {
        AppError::BadRequest(_) => "invalid_argument",
        AppError::NotFound(_) => "not_found",
        AppError::StorageError(_) => "storage_unavailable",
        AppError::InternalError(_) => "internal_error",
    }
}

impl From<TelescopeError> for AppError {
    fn from(err: TelescopeError) -> Self {
        match err {
            TelescopeError::InvalidArgument(msg) => Self::BadRequest(msg),
            TelescopeError::NotFound(msg) => Self::NotFound(msg),
            TelescopeError::StorageUnavailable(msg) => Self::StorageError(msg),
            TelescopeError::CaptureFailure(msg) => Self::InternalError(msg),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError(err.to_string())
    }
}
