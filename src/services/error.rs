//! Error taxonomy shared by the storage services.

use std::io;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("access to bucket `{0}` denied")]
    AccessDenied(String),
    #[error("caller identity required")]
    Unauthenticated,
    #[error("bucket `{0}` already exists")]
    BucketAlreadyExists(String),
    #[error("bucket `{0}` is not empty")]
    BucketNotEmpty(String),
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("object `{key}` not found")]
    ObjectNotFound { key: String },
    #[error("version `{version_id}` of object `{key}` not found")]
    VersionNotFound { key: String, version_id: String },
    #[error("object record {0} not found")]
    RecordNotFound(Uuid),
    #[error("invalid object key")]
    InvalidObjectKey,
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),
    #[error("content digest mismatch: declared {declared}, computed {computed}")]
    DigestMismatch { declared: String, computed: String },
    #[error("version `{version_id}` of object `{key}` has no content on disk")]
    CorruptState { key: String, version_id: String },
    #[error("conflicting concurrent write to object `{key}`")]
    Conflict { key: String },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StoreError {
    /// True for every "no such bucket/object/version/record" variant.
    #[cfg(test)]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::BucketNotFound(_)
                | StoreError::ObjectNotFound { .. }
                | StoreError::VersionNotFound { .. }
                | StoreError::RecordNotFound(_)
        )
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Return true if SQLx error indicates a unique constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}
