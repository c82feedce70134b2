//! Represents a logical bucket - a top-level container for objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A storage bucket.
///
/// Buckets act as namespaces for objects and belong to a single owner.
/// Public buckets can be read by anyone, including anonymous callers.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Bucket {
    /// Unique identifier for this bucket (UUID for internal DB use).
    pub id: Uuid,

    /// Globally unique bucket name (must conform to DNS naming rules).
    pub name: String,

    /// ID of the caller that owns this bucket.
    pub owner_id: Uuid,

    /// Readable without being the owner.
    pub is_public: bool,

    /// Versioning flag. Uploads never destroy earlier payloads either way.
    pub versioning_enabled: bool,

    /// When this bucket was created.
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /buckets`.
#[derive(Deserialize, Debug)]
pub struct CreateBucketRequest {
    pub name: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default = "default_versioning")]
    pub versioning: bool,
}

fn default_versioning() -> bool {
    true
}
