//! Represents one stored version of an object (file) in a bucket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;

use super::metadata::Attributes;

/// Content type recorded when the uploader does not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A single immutable version of an object.
///
/// All versions sharing a `(bucket_id, key)` pair form a version family; at
/// most one of them carries `is_latest`. The struct stores metadata only, the
/// payload lives on disk at `storage_path`.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ObjectVersion {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Owning bucket.
    pub bucket_id: Uuid,

    /// Object key (path-like identifier within the bucket).
    pub key: String,

    /// Version identifier minted at upload time.
    pub version_id: String,

    /// Number of bytes actually written.
    pub size: i64,

    /// Content type (MIME type).
    pub content_type: String,

    /// Hex MD5 of the stored bytes.
    pub etag: String,

    /// Where the payload lives. Never sent to clients.
    #[serde(skip)]
    pub storage_path: String,

    /// Whether this is the current version of its key.
    pub is_latest: bool,

    /// Caller-supplied and system-derived attributes.
    pub metadata: Json<Attributes>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Tombstone timestamp. Tombstoned versions are hidden from every query.
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ObjectVersion {
    /// Last path segment of the key, used for `Content-Disposition`.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}
