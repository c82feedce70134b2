//! Shared fixtures for unit tests: a temp directory holding a file-backed
//! SQLite database and the payload root.

use chrono::Utc;
use sqlx::{SqlitePool, types::Json};
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

use crate::{
    db,
    models::{bucket::Bucket, metadata::Attributes, object::ObjectVersion},
    services::{
        bucket_service::BucketService,
        content_store::LocalContentStore,
        metadata_store::{MetadataStore, SqliteMetadataStore},
        object_service::{ObjectService, ObjectServiceConfig},
        paths::StorageLayout,
    },
    state::AppState,
};

pub struct TestEnv {
    pub dir: TempDir,
    pub db: Arc<SqlitePool>,
    pub layout: StorageLayout,
}

impl TestEnv {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::open_file(&dir.path().join("meta.db")).await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        let layout = StorageLayout::new(dir.path().join("objects"));
        Self {
            dir,
            db: Arc::new(pool),
            layout,
        }
    }

    pub fn metadata_store(&self) -> SqliteMetadataStore {
        SqliteMetadataStore::new(self.db.clone())
    }

    pub fn object_service(&self) -> ObjectService {
        self.object_service_with(Arc::new(self.metadata_store()))
    }

    /// Object service over a custom metadata store (used to inject failures).
    pub fn object_service_with(&self, metadata: Arc<dyn MetadataStore>) -> ObjectService {
        ObjectService::new(
            metadata,
            Arc::new(LocalContentStore::new(self.layout.root())),
            self.layout.clone(),
            ObjectServiceConfig::default(),
        )
    }

    pub fn bucket_service(&self) -> BucketService {
        BucketService::new(self.db.clone())
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            db: self.db.clone(),
            buckets: self.bucket_service(),
            objects: self.object_service(),
            storage_root: self.layout.root().to_path_buf(),
            max_page_size: 1000,
        }
    }

    /// Insert a bucket row directly.
    pub async fn bucket(&self, name: &str, owner_id: Uuid, is_public: bool) -> Bucket {
        let bucket = Bucket {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner_id,
            is_public,
            versioning_enabled: true,
            created_at: Utc::now(),
        };
        sqlx::query(
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
        .unwrap();
        bucket
    }
}

/// A latest record with placeholder content fields.
pub fn version_record(bucket_id: Uuid, key: &str) -> ObjectVersion {
    let now = Utc::now();
    let version_id = Uuid::new_v4().to_string();
    ObjectVersion {
        id: Uuid::new_v4(),
        bucket_id,
        key: key.to_string(),
        storage_path: format!("/nowhere/{}/{}", key, version_id),
        version_id,
        size: 0,
        content_type: "application/octet-stream".into(),
        etag: "d41d8cd98f00b204e9800998ecf8427e".into(),
        is_latest: true,
        metadata: Json(Attributes::new()),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}
