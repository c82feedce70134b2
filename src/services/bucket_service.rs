//! Bucket lifecycle and resolution.
//!
//! The object store itself takes an already-authorized bucket id. This
//! service produces it: `resolve` maps a bucket name plus an optional caller
//! to a `Bucket`, denying access to private buckets the caller does not own.

use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::error::{StoreError, StoreResult, is_unique_violation};
use crate::{auth::CallerIdentity, models::bucket::Bucket};

const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;

const BUCKET_COLUMNS: &str = "id, name, owner_id, is_public, versioning_enabled, created_at";

#[derive(Clone)]
pub struct BucketService {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,
}

impl BucketService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Fetch bucket metadata by name.
    ///
    /// Returns BucketNotFound if missing.
    async fn fetch_bucket(&self, name: &str) -> StoreResult<Bucket> {
        ensure_bucket_name_safe(name)?;
        sqlx::query_as::<_, Bucket>(&format!(
            "SELECT {BUCKET_COLUMNS} FROM buckets WHERE name = ?"
        ))
        .bind(name)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| StoreError::BucketNotFound(name.to_string()))
    }

    /// Resolve `name` for `caller`.
    ///
    /// Owners always get through; everyone else, anonymous callers included,
    /// only for public buckets.
    pub async fn resolve(
        &self,
        caller: Option<&CallerIdentity>,
        name: &str,
    ) -> StoreResult<Bucket> {
        let bucket = self.fetch_bucket(name).await?;
        if bucket.is_public || caller.is_some_and(|c| c.id == bucket.owner_id) {
            Ok(bucket)
        } else {
            Err(StoreError::AccessDenied(name.to_string()))
        }
    }

    /// Resolve `name` for an operation only the owner may perform.
    pub async fn resolve_owned(
        &self,
        caller: Option<&CallerIdentity>,
        name: &str,
    ) -> StoreResult<Bucket> {
        let caller = caller.ok_or(StoreError::Unauthenticated)?;
        let bucket = self.fetch_bucket(name).await?;
        if bucket.owner_id == caller.id {
            Ok(bucket)
        } else {
            Err(StoreError::AccessDenied(name.to_string()))
        }
    }

    /// Create a bucket owned by `caller`.
    ///
    /// Returns BucketAlreadyExists if the name is taken.
    pub async fn create_bucket(
        &self,
        caller: &CallerIdentity,
        name: &str,
        is_public: bool,
        versioning_enabled: bool,
    ) -> StoreResult<Bucket> {
        ensure_bucket_name_safe(name)?;

        let bucket = Bucket {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_id: caller.id,
            is_public,
            versioning_enabled,
            created_at: Utc::now(),
        };

        match sqlx::query(
            "INSERT INTO buckets (id, name, owner_id, is_public, versioning_enabled, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(bucket.id)
        .bind(&bucket.name)
        .bind(bucket.owner_id)
        .bind(bucket.is_public)
        .bind(bucket.versioning_enabled)
        .bind(bucket.created_at)
        .execute(&*self.db)
        .await
        {
            Ok(_) => {
                info!(bucket = %bucket.name, owner = %bucket.owner_id, "created bucket");
                Ok(bucket)
            }
            Err(err) if is_unique_violation(&err) => {
                Err(StoreError::BucketAlreadyExists(name.to_string()))
            }
            Err(err) => Err(StoreError::Database(err)),
        }
    }

    /// Buckets owned by `owner_id`, by name.
    pub async fn list_buckets(&self, owner_id: Uuid) -> StoreResult<Vec<Bucket>> {
        let rows = sqlx::query_as::<_, Bucket>(&format!(
            "SELECT {BUCKET_COLUMNS} FROM buckets WHERE owner_id = ? ORDER BY name ASC"
        ))
        .bind(owner_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    /// Delete an empty bucket owned by `caller`.
    ///
    /// Refuses while any live object version remains. Tombstoned version rows
    /// of the bucket are purged with it.
    pub async fn delete_bucket(&self, caller: Option<&CallerIdentity>, name: &str) -> StoreResult<()> {
        let bucket = self.resolve_owned(caller, name).await?;

        let mut tx = self.db.begin().await?;
        let live: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM object_versions WHERE bucket_id = ? AND deleted_at IS NULL",
        )
        .bind(bucket.id)
        .fetch_one(&mut *tx)
        .await?;
        if live > 0 {
            return Err(StoreError::BucketNotEmpty(name.to_string()));
        }

        sqlx::query("DELETE FROM object_versions WHERE bucket_id = ?")
            .bind(bucket.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM buckets WHERE id = ?")
            .bind(bucket.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(bucket = %name, "deleted bucket");
        Ok(())
    }
}

/// Validate bucket name format.
///
/// Enforces S3-like naming rules:
/// - 3 to 63 characters
/// - lowercase letters, digits, dots, hyphens only
/// - cannot start/end with dot or hyphen
/// - cannot contain consecutive dots or dot-hyphen patterns
/// - cannot look like an IPv4 address
pub fn ensure_bucket_name_safe(name: &str) -> StoreResult<()> {
    let invalid = |reason: &str| StoreError::InvalidBucketName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let len = name.len();
    if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
        return Err(invalid("must be between 3 and 63 characters"));
    }

    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
    {
        return Err(invalid(
            "allowed characters are lowercase letters, digits, dots, and hyphens",
        ));
    }

    if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
        return Err(invalid("must start and end with a lowercase letter or digit"));
    }

    if name.contains("..") || name.contains("-.") || name.contains(".-") {
        return Err(invalid(
            "cannot contain consecutive dots or dot-hyphen combinations",
        ));
    }

    if is_ipv4_like(name) {
        return Err(invalid("must not be formatted like an IP address"));
    }

    Ok(())
}

/// Check if a string matches IPv4-like dotted decimal form.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}
