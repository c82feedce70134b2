use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::services::error::StoreError;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

/// Client errors keep their message; server-side failures are logged and
/// replaced by a generic message so no paths or internals leak.
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::BucketNotFound(_)
            | StoreError::ObjectNotFound { .. }
            | StoreError::VersionNotFound { .. }
            | StoreError::RecordNotFound(_) => AppError::not_found(err.to_string()),
            StoreError::AccessDenied(_) => AppError::new(StatusCode::FORBIDDEN, err.to_string()),
            StoreError::Unauthenticated => AppError::unauthorized(err.to_string()),
            StoreError::BucketAlreadyExists(_) | StoreError::BucketNotEmpty(_) => {
                AppError::new(StatusCode::CONFLICT, err.to_string())
            }
            StoreError::InvalidBucketName { .. }
            | StoreError::InvalidObjectKey
            | StoreError::InvalidMetadata(_)
            | StoreError::DigestMismatch { .. } => AppError::bad_request(err.to_string()),
            StoreError::CorruptState { .. }
            | StoreError::Conflict { .. }
            | StoreError::Database(_)
            | StoreError::Io(_) => {
                tracing::error!("request failed: {}", err);
                AppError::internal("internal server error")
            }
        }
    }
}
