//! Durable records of object versions.
//!
//! The metadata store owns the lifecycle of `ObjectVersion` rows: insertion,
//! latest-pointer maintenance, lookup, listing and tombstoning. The SQLite
//! schema backs the "one latest per key" rule with a partial unique index, so
//! a racing second latest insert fails with `Conflict` instead of silently
//! creating two latest rows.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::sync::Arc;
use uuid::Uuid;

use super::error::{StoreError, StoreResult, is_unique_violation};
use crate::models::object::ObjectVersion;

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 1000;

const VERSION_COLUMNS: &str = "id, bucket_id, key, version_id, size, content_type, etag, \
     storage_path, is_latest, metadata, created_at, updated_at, deleted_at";

/// One page of latest versions plus the total number of matches.
#[derive(Debug)]
pub struct ObjectPage {
    pub objects: Vec<ObjectVersion>,
    pub total_count: i64,
    pub page: i64,
    pub page_size: i64,
}

/// Normalize paging input: `page < 1` becomes 1, `page_size <= 0` becomes
/// the default.
pub fn normalize_paging(page: i64, page_size: i64) -> (i64, i64) {
    let page = page.max(1);
    let page_size = if page_size <= 0 {
        DEFAULT_PAGE_SIZE
    } else {
        page_size
    };
    (page, page_size)
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a new record. Uniqueness violations surface as `Conflict`.
    async fn insert(&self, record: &ObjectVersion) -> StoreResult<()>;

    /// Clear the latest flag of every latest record of the key. No-op when
    /// there is none.
    async fn demote_latest(&self, bucket_id: Uuid, key: &str) -> StoreResult<()>;

    async fn get_latest(&self, bucket_id: Uuid, key: &str) -> StoreResult<ObjectVersion>;

    async fn get_version(
        &self,
        bucket_id: Uuid,
        key: &str,
        version_id: &str,
    ) -> StoreResult<ObjectVersion>;

    /// All live versions of a key, newest first.
    async fn list_versions(&self, bucket_id: Uuid, key: &str) -> StoreResult<Vec<ObjectVersion>>;

    /// Latest live versions whose key starts with `prefix`, ordered by key.
    ///
    /// Callers enforce the upper bound on `page_size`.
    async fn list(
        &self,
        bucket_id: Uuid,
        prefix: &str,
        page: i64,
        page_size: i64,
    ) -> StoreResult<ObjectPage>;

    /// Hide a record from every query. Clears its latest flag.
    async fn tombstone(&self, record_id: Uuid) -> StoreResult<()>;

    /// If the key has no latest record, flag its newest live record as
    /// latest. Returns whether a record was promoted.
    async fn promote_newest(&self, bucket_id: Uuid, key: &str) -> StoreResult<bool>;
}

/// `MetadataStore` over the `object_versions` SQLite table.
#[derive(Clone)]
pub struct SqliteMetadataStore {
    db: Arc<SqlitePool>,
}

impl SqliteMetadataStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn insert(&self, record: &ObjectVersion) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO object_versions (
                id, bucket_id, key, version_id, size, content_type, etag,
                storage_path, is_latest, metadata, created_at, updated_at, deleted_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id)
        .bind(record.bucket_id)
        .bind(&record.key)
        .bind(&record.version_id)
        .bind(record.size)
        .bind(&record.content_type)
        .bind(&record.etag)
        .bind(&record.storage_path)
        .bind(record.is_latest)
        .bind(&record.metadata)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.deleted_at)
        .execute(&*self.db)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(StoreError::Conflict {
                key: record.key.clone(),
            }),
            Err(err) => Err(StoreError::Database(err)),
        }
    }

    async fn demote_latest(&self, bucket_id: Uuid, key: &str) -> StoreResult<()> {
        sqlx::query(
            "UPDATE object_versions SET is_latest = 0, updated_at = ?
             WHERE bucket_id = ? AND key = ? AND is_latest = 1",
        )
        .bind(Utc::now())
        .bind(bucket_id)
        .bind(key)
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    async fn get_latest(&self, bucket_id: Uuid, key: &str) -> StoreResult<ObjectVersion> {
        sqlx::query_as::<_, ObjectVersion>(&format!(
            "SELECT {VERSION_COLUMNS} FROM object_versions
             WHERE bucket_id = ? AND key = ? AND is_latest = 1 AND deleted_at IS NULL"
        ))
        .bind(bucket_id)
        .bind(key)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| StoreError::ObjectNotFound {
            key: key.to_string(),
        })
    }

    async fn get_version(
        &self,
        bucket_id: Uuid,
        key: &str,
        version_id: &str,
    ) -> StoreResult<ObjectVersion> {
        sqlx::query_as::<_, ObjectVersion>(&format!(
            "SELECT {VERSION_COLUMNS} FROM object_versions
             WHERE bucket_id = ? AND key = ? AND version_id = ? AND deleted_at IS NULL"
        ))
        .bind(bucket_id)
        .bind(key)
        .bind(version_id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| StoreError::VersionNotFound {
            key: key.to_string(),
            version_id: version_id.to_string(),
        })
    }

    async fn list_versions(&self, bucket_id: Uuid, key: &str) -> StoreResult<Vec<ObjectVersion>> {
        let rows = sqlx::query_as::<_, ObjectVersion>(&format!(
            "SELECT {VERSION_COLUMNS} FROM object_versions
             WHERE bucket_id = ? AND key = ? AND deleted_at IS NULL
             ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(bucket_id)
        .bind(key)
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    async fn list(
        &self,
        bucket_id: Uuid,
        prefix: &str,
        page: i64,
        page_size: i64,
    ) -> StoreResult<ObjectPage> {
        let (page, page_size) = normalize_paging(page, page_size);

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM object_versions");
        push_list_filter(&mut count, bucket_id, prefix);
        let total_count = count
            .build_query_scalar::<i64>()
            .fetch_one(&*self.db)
            .await?;

        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {VERSION_COLUMNS} FROM object_versions"
        ));
        push_list_filter(&mut builder, bucket_id, prefix);
        builder.push(" ORDER BY key ASC LIMIT ");
        builder.push_bind(page_size);
        builder.push(" OFFSET ");
        builder.push_bind((page - 1).saturating_mul(page_size));

        let objects: Vec<ObjectVersion> = builder.build_query_as().fetch_all(&*self.db).await?;

        Ok(ObjectPage {
            objects,
            total_count,
            page,
            page_size,
        })
    }

    async fn tombstone(&self, record_id: Uuid) -> StoreResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE object_versions SET deleted_at = ?, is_latest = 0, updated_at = ?
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(record_id)
        .execute(&*self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RecordNotFound(record_id));
        }
        Ok(())
    }

    async fn promote_newest(&self, bucket_id: Uuid, key: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE object_versions SET is_latest = 1, updated_at = ?
             WHERE id = (
                 SELECT id FROM object_versions
                 WHERE bucket_id = ? AND key = ? AND deleted_at IS NULL
                 ORDER BY created_at DESC, rowid DESC LIMIT 1
             )
             AND NOT EXISTS (
                 SELECT 1 FROM object_versions
                 WHERE bucket_id = ? AND key = ? AND is_latest = 1
             )",
        )
        .bind(Utc::now())
        .bind(bucket_id)
        .bind(key)
        .bind(bucket_id)
        .bind(key)
        .execute(&*self.db)
        .await;

        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(err) if is_unique_violation(&err) => Err(StoreError::Conflict {
                key: key.to_string(),
            }),
            Err(err) => Err(StoreError::Database(err)),
        }
    }
}

/// Filter shared by the count and page queries of `list`.
///
/// `substr` keeps the prefix match case-sensitive and free of LIKE wildcards.
fn push_list_filter(builder: &mut QueryBuilder<'_, Sqlite>, bucket_id: Uuid, prefix: &str) {
    builder.push(" WHERE bucket_id = ");
    builder.push_bind(bucket_id);
    builder.push(" AND is_latest = 1 AND deleted_at IS NULL");
    if !prefix.is_empty() {
        builder.push(" AND substr(key, 1, length(");
        builder.push_bind(prefix.to_string());
        builder.push(")) = ");
        builder.push_bind(prefix.to_string());
    }
}
