//! ObjectService - versioned uploads, reads and deletes.
//!
//! Upload runs `derive → write → demote → insert`. Bytes are always durable
//! before any metadata refers to them, so a crash part-way leaves at worst an
//! unreferenced file, never a record pointing at missing bytes. Any failure
//! after the write removes the new file again (best effort) before the
//! original error is returned.
//!
//! Delete removes the latest version's bytes first and only then tombstones
//! its record; a removal failure leaves metadata untouched.

use base64::{Engine as _, engine::general_purpose};
use chrono::Utc;
use serde::Serialize;
use sqlx::types::Json;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    content_store::{ByteStream, ContentReader, ContentStore},
    error::{StoreError, StoreResult},
    metadata_store::{MetadataStore, ObjectPage},
    paths::{StorageLayout, validate_key},
};
use crate::{
    auth::CallerIdentity,
    models::{
        metadata::{Attributes, SystemAttributes},
        object::{DEFAULT_CONTENT_TYPE, ObjectVersion},
    },
};

#[derive(Clone, Debug)]
pub struct ObjectServiceConfig {
    /// Extra demote+insert rounds after a latest-pointer conflict.
    pub conflict_retries: u32,
    /// Base delay between rounds, multiplied by the attempt number.
    pub retry_backoff: Duration,
}

impl Default for ObjectServiceConfig {
    fn default() -> Self {
        Self {
            conflict_retries: 3,
            retry_backoff: Duration::from_millis(10),
        }
    }
}

/// Everything about an upload besides the bytes themselves.
#[derive(Debug, Default)]
pub struct UploadRequest {
    pub content_type: Option<String>,
    /// Caller attributes, already validated.
    pub attributes: Attributes,
    /// Base64 MD5 declared by the client (`Content-MD5`).
    pub declared_md5: Option<String>,
    pub original_filename: Option<String>,
    pub caller: Option<CallerIdentity>,
    pub user_agent: Option<String>,
    pub client_ip: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct UploadOutcome {
    pub object: ObjectVersion,
    pub version_id: String,
}

#[derive(Clone)]
pub struct ObjectService {
    metadata: Arc<dyn MetadataStore>,
    content: Arc<dyn ContentStore>,
    layout: StorageLayout,
    config: ObjectServiceConfig,
}

impl ObjectService {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        content: Arc<dyn ContentStore>,
        layout: StorageLayout,
        config: ObjectServiceConfig,
    ) -> Self {
        Self {
            metadata,
            content,
            layout,
            config,
        }
    }

    /// Store a new version of `key` and make it the latest.
    pub async fn upload(
        &self,
        bucket_id: Uuid,
        key: &str,
        body: ByteStream,
        request: UploadRequest,
    ) -> StoreResult<UploadOutcome> {
        validate_key(key)?;
        let version_id = Uuid::new_v4().to_string();
        let location = self.layout.derive(bucket_id, key, &version_id);

        self.layout.ensure_parent(&location).await?;
        let written = self.content.write(&location, body).await?;

        if let Some(declared) = request.declared_md5.as_deref() {
            let computed = general_purpose::STANDARD.encode(written.digest);
            if declared.trim() != computed {
                self.discard(&location).await;
                return Err(StoreError::DigestMismatch {
                    declared: declared.to_string(),
                    computed,
                });
            }
        }

        let content_type = request
            .content_type
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let now = Utc::now();
        let attributes = SystemAttributes {
            upload_time: now,
            original_filename: request
                .original_filename
                .unwrap_or_else(|| key.rsplit('/').next().unwrap_or(key).to_string()),
            file_size: written.size,
            content_type: content_type.clone(),
            uploaded_by: request.caller.as_ref().and_then(|c| c.username.clone()),
            uploaded_by_id: request.caller.as_ref().map(|c| c.id.to_string()),
            user_agent: request.user_agent,
            client_ip: request.client_ip,
        }
        .merge_into(request.attributes);

        let mut record = ObjectVersion {
            id: Uuid::new_v4(),
            bucket_id,
            key: key.to_string(),
            version_id: version_id.clone(),
            size: written.size,
            content_type,
            etag: written.etag(),
            storage_path: location.to_string_lossy().into_owned(),
            is_latest: true,
            metadata: Json(attributes),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        if let Err(err) = self.commit(&mut record).await {
            self.discard(&location).await;
            if let Err(repair) = self.metadata.promote_newest(bucket_id, key).await {
                warn!("could not restore latest version of `{}`: {}", key, repair);
            }
            return Err(err);
        }

        info!(
            bucket = %bucket_id,
            key,
            version_id = %record.version_id,
            size = record.size,
            "stored object version"
        );
        Ok(UploadOutcome {
            object: record,
            version_id,
        })
    }

    /// Demote the current latest and insert `record` as the new one.
    ///
    /// A `Conflict` means a concurrent upload inserted its latest between our
    /// demote and insert; demote again and retry a bounded number of times.
    async fn commit(&self, record: &mut ObjectVersion) -> StoreResult<()> {
        let mut attempt: u32 = 0;
        loop {
            self.metadata
                .demote_latest(record.bucket_id, &record.key)
                .await?;
            match self.metadata.insert(record).await {
                Err(StoreError::Conflict { .. }) if attempt < self.config.conflict_retries => {
                    attempt += 1;
                    warn!(
                        key = %record.key,
                        attempt,
                        "latest-version conflict, retrying"
                    );
                    tokio::time::sleep(self.config.retry_backoff * attempt).await;
                    let now = Utc::now();
                    record.created_at = now;
                    record.updated_at = now;
                }
                other => return other,
            }
        }
    }

    /// Best-effort removal of a file no record refers to.
    async fn discard(&self, location: &Path) {
        if let Err(err) = self.content.remove(location).await {
            warn!("failed to remove orphaned file {}: {}", location.display(), err);
        }
    }

    /// Latest version of `key` together with a reader over its bytes.
    pub async fn get_latest(
        &self,
        bucket_id: Uuid,
        key: &str,
    ) -> StoreResult<(ObjectVersion, ContentReader)> {
        let record = self.head_latest(bucket_id, key).await?;
        self.open_record(record).await
    }

    /// One pinned version of `key` together with a reader over its bytes.
    pub async fn get_version(
        &self,
        bucket_id: Uuid,
        key: &str,
        version_id: &str,
    ) -> StoreResult<(ObjectVersion, ContentReader)> {
        let record = self.head_version(bucket_id, key, version_id).await?;
        self.open_record(record).await
    }

    pub async fn head_latest(&self, bucket_id: Uuid, key: &str) -> StoreResult<ObjectVersion> {
        validate_key(key)?;
        self.metadata.get_latest(bucket_id, key).await
    }

    pub async fn head_version(
        &self,
        bucket_id: Uuid,
        key: &str,
        version_id: &str,
    ) -> StoreResult<ObjectVersion> {
        validate_key(key)?;
        self.metadata.get_version(bucket_id, key, version_id).await
    }

    async fn open_record(
        &self,
        record: ObjectVersion,
    ) -> StoreResult<(ObjectVersion, ContentReader)> {
        match self.content.open(Path::new(&record.storage_path)).await {
            Ok(reader) => Ok((record, reader)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                error!(
                    key = %record.key,
                    version_id = %record.version_id,
                    "object record points at missing content"
                );
                Err(StoreError::CorruptState {
                    key: record.key,
                    version_id: record.version_id,
                })
            }
            Err(err) => Err(StoreError::Io(err)),
        }
    }

    /// Latest versions under `prefix`, one page at a time.
    pub async fn list(
        &self,
        bucket_id: Uuid,
        prefix: &str,
        page: i64,
        page_size: i64,
    ) -> StoreResult<ObjectPage> {
        self.metadata.list(bucket_id, prefix, page, page_size).await
    }

    /// Every live version of `key`, newest first.
    pub async fn list_versions(&self, bucket_id: Uuid, key: &str) -> StoreResult<Vec<ObjectVersion>> {
        validate_key(key)?;
        self.metadata.list_versions(bucket_id, key).await
    }

    /// Delete the latest version of `key`: bytes first, then metadata.
    ///
    /// The next newest live version, if any, becomes the latest.
    pub async fn delete(&self, bucket_id: Uuid, key: &str) -> StoreResult<ObjectVersion> {
        validate_key(key)?;
        let record = self.metadata.get_latest(bucket_id, key).await?;

        let location = PathBuf::from(&record.storage_path);
        if !self.content.remove(&location).await? {
            warn!(
                key,
                version_id = %record.version_id,
                "content already absent while deleting"
            );
        }

        self.metadata.tombstone(record.id).await?;
        if let Err(err) = self.metadata.promote_newest(bucket_id, key).await {
            warn!("could not promote previous version of `{}`: {}", key, err);
        }

        info!(
            bucket = %bucket_id,
            key,
            version_id = %record.version_id,
            "deleted object version"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        services::{
            content_store::{LocalContentStore, stream_from},
            metadata_store::SqliteMetadataStore,
        },
        test_support::TestEnv,
    };
    use async_trait::async_trait;
    use bytes::Bytes;
    use serde_json::json;
    use std::io;
    use tokio::io::AsyncReadExt;

    async fn read_all(mut reader: ContentReader) -> Vec<u8> {
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        out
    }

    async fn put(service: &ObjectService, bucket: Uuid, key: &str, data: &[u8]) -> UploadOutcome {
        service
            .upload(bucket, key, stream_from(data, 3), UploadRequest::default())
            .await
            .unwrap()
    }

    /// Regular files beneath `root`, ignoring directories.
    fn files_under(root: &Path) -> Vec<PathBuf> {
        let mut found = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else {
                    found.push(path);
                }
            }
        }
        found
    }

    #[derive(Default)]
    struct Faults {
        demote: bool,
        insert: bool,
    }

    /// SQLite store that fails selected operations.
    struct FaultyStore {
        inner: SqliteMetadataStore,
        faults: Faults,
    }

    fn injected() -> StoreError {
        StoreError::Database(sqlx::Error::PoolTimedOut)
    }

    #[async_trait]
    impl MetadataStore for FaultyStore {
        async fn insert(&self, record: &ObjectVersion) -> StoreResult<()> {
            if self.faults.insert {
                return Err(injected());
            }
            self.inner.insert(record).await
        }
        async fn demote_latest(&self, bucket_id: Uuid, key: &str) -> StoreResult<()> {
            if self.faults.demote {
                return Err(injected());
            }
            self.inner.demote_latest(bucket_id, key).await
        }
        async fn get_latest(&self, bucket_id: Uuid, key: &str) -> StoreResult<ObjectVersion> {
            self.inner.get_latest(bucket_id, key).await
        }
        async fn get_version(
            &self,
            bucket_id: Uuid,
            key: &str,
            version_id: &str,
        ) -> StoreResult<ObjectVersion> {
            self.inner.get_version(bucket_id, key, version_id).await
        }
        async fn list_versions(
            &self,
            bucket_id: Uuid,
            key: &str,
        ) -> StoreResult<Vec<ObjectVersion>> {
            self.inner.list_versions(bucket_id, key).await
        }
        async fn list(
            &self,
            bucket_id: Uuid,
            prefix: &str,
            page: i64,
            page_size: i64,
        ) -> StoreResult<ObjectPage> {
            self.inner.list(bucket_id, prefix, page, page_size).await
        }
        async fn tombstone(&self, record_id: Uuid) -> StoreResult<()> {
            self.inner.tombstone(record_id).await
        }
        async fn promote_newest(&self, bucket_id: Uuid, key: &str) -> StoreResult<bool> {
            self.inner.promote_newest(bucket_id, key).await
        }
    }

    #[tokio::test]
    async fn upload_records_measured_size_and_digest() {
        let env = TestEnv::new().await;
        let service = env.object_service();
        let bucket = Uuid::new_v4();
        let payload = vec![7u8; 10_000];

        let outcome = put(&service, bucket, "blob.bin", &payload).await;

        assert_eq!(outcome.object.size, 10_000);
        assert_eq!(outcome.object.etag, format!("{:x}", md5::compute(&payload)));
        assert_eq!(outcome.object.content_type, DEFAULT_CONTENT_TYPE);
        assert_eq!(outcome.version_id, outcome.object.version_id);
        assert!(outcome.object.is_latest);

        let (record, reader) = service.get_latest(bucket, "blob.bin").await.unwrap();
        assert_eq!(record.id, outcome.object.id);
        assert_eq!(read_all(reader).await, payload);
        assert_eq!(
            PathBuf::from(&record.storage_path),
            env.layout.derive(bucket, "blob.bin", &record.version_id)
        );
    }

    #[tokio::test]
    async fn second_upload_keeps_first_version_fetchable() {
        let env = TestEnv::new().await;
        let service = env.object_service();
        let bucket = Uuid::new_v4();

        let first = put(&service, bucket, "report.pdf", b"draft one").await;
        let second = put(&service, bucket, "report.pdf", b"final draft two").await;

        let (latest, reader) = service.get_latest(bucket, "report.pdf").await.unwrap();
        assert_eq!(latest.version_id, second.version_id);
        assert_eq!(read_all(reader).await, b"final draft two");

        let (old, reader) = service
            .get_version(bucket, "report.pdf", &first.version_id)
            .await
            .unwrap();
        assert!(!old.is_latest);
        assert_eq!(old.etag, first.object.etag);
        assert_eq!(read_all(reader).await, b"draft one");

        let versions = service.list_versions(bucket, "report.pdf").await.unwrap();
        let ids: Vec<&str> = versions.iter().map(|v| v.version_id.as_str()).collect();
        assert_eq!(ids, vec![second.version_id.as_str(), first.version_id.as_str()]);
    }

    #[tokio::test]
    async fn attributes_merge_caller_and_system_values() {
        let env = TestEnv::new().await;
        let service = env.object_service();
        let caller = CallerIdentity::new(Uuid::new_v4(), "ada");
        let mut attributes = Attributes::new();
        attributes.insert("team".into(), json!("infra"));
        attributes.insert("file_size".into(), json!(1));

        let outcome = service
            .upload(
                Uuid::new_v4(),
                "docs/notes.txt",
                stream_from(b"hello", 5),
                UploadRequest {
                    content_type: Some("text/plain".into()),
                    attributes,
                    caller: Some(caller.clone()),
                    user_agent: Some("curl/8.5.0".into()),
                    client_ip: Some("203.0.113.7".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let meta = &outcome.object.metadata.0;
        assert_eq!(meta.get("team"), Some(&json!("infra")));
        assert_eq!(meta.get("file_size"), Some(&json!(5)));
        assert_eq!(meta.get("original_filename"), Some(&json!("notes.txt")));
        assert_eq!(meta.get("content_type"), Some(&json!("text/plain")));
        assert_eq!(meta.get("uploaded_by"), Some(&json!("ada")));
        assert_eq!(
            meta.get("uploaded_by_id"),
            Some(&json!(caller.id.to_string()))
        );
        assert!(meta.contains_key("upload_time"));
        assert_eq!(meta.get("user_agent"), Some(&json!("curl/8.5.0")));
        assert_eq!(meta.get("client_ip"), Some(&json!("203.0.113.7")));
    }

    #[tokio::test]
    async fn declared_md5_is_verified() {
        let env = TestEnv::new().await;
        let service = env.object_service();
        let bucket = Uuid::new_v4();
        let good = general_purpose::STANDARD.encode(md5::compute(b"abc").0);

        service
            .upload(
                bucket,
                "ok",
                stream_from(b"abc", 1),
                UploadRequest {
                    declared_md5: Some(good),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = service
            .upload(
                bucket,
                "bad",
                stream_from(b"abc", 1),
                UploadRequest {
                    declared_md5: Some(general_purpose::STANDARD.encode([0u8; 16])),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DigestMismatch { .. }));
        assert!(service.get_latest(bucket, "bad").await.is_err());
        assert_eq!(files_under(env.layout.root()).len(), 1);
    }

    #[tokio::test]
    async fn interrupted_upload_records_nothing() {
        let env = TestEnv::new().await;
        let service = env.object_service();
        let bucket = Uuid::new_v4();
        let chunks: Vec<io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"half")),
            Err(io::Error::new(ErrorKind::BrokenPipe, "client went away")),
        ];

        let err = service
            .upload(
                bucket,
                "k",
                Box::pin(futures::stream::iter(chunks)),
                UploadRequest::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Io(_)));
        assert!(service.list_versions(bucket, "k").await.unwrap().is_empty());
        assert!(files_under(env.layout.root()).is_empty());
    }

    #[tokio::test]
    async fn failed_insert_removes_orphaned_file() {
        let env = TestEnv::new().await;
        let bucket = Uuid::new_v4();
        put(&env.object_service(), bucket, "k", b"v1").await;

        let faulty = env.object_service_with(Arc::new(FaultyStore {
            inner: env.metadata_store(),
            faults: Faults {
                insert: true,
                ..Default::default()
            },
        }));
        let err = faulty
            .upload(bucket, "k", stream_from(b"v2", 1), UploadRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));

        // only the first version's file survives and it is latest again
        assert_eq!(files_under(env.layout.root()).len(), 1);
        let (latest, reader) = env.object_service().get_latest(bucket, "k").await.unwrap();
        assert_eq!(read_all(reader).await, b"v1");
        assert!(latest.is_latest);
    }

    #[tokio::test]
    async fn failed_demote_removes_written_file() {
        let env = TestEnv::new().await;
        let faulty = env.object_service_with(Arc::new(FaultyStore {
            inner: env.metadata_store(),
            faults: Faults {
                demote: true,
                ..Default::default()
            },
        }));

        let err = faulty
            .upload(Uuid::new_v4(), "k", stream_from(b"x", 1), UploadRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
        assert!(files_under(env.layout.root()).is_empty());
    }

    #[tokio::test]
    async fn invalid_key_touches_nothing() {
        let env = TestEnv::new().await;
        let service = env.object_service();
        let err = service
            .upload(Uuid::new_v4(), "../escape", stream_from(b"x", 1), UploadRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidObjectKey));
        assert!(!env.layout.root().exists());

        let oversized = format!("dir/{}", "a".repeat(300));
        let err = service
            .upload(Uuid::new_v4(), &oversized, stream_from(b"x", 1), UploadRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidObjectKey));
    }

    #[tokio::test]
    async fn keys_nested_under_a_version_id_are_stored() {
        let env = TestEnv::new().await;
        let service = env.object_service();
        let bucket = Uuid::new_v4();
        let first = put(&service, bucket, "a", b"short").await;

        let nested_key = format!("a/{}/b", first.version_id);
        put(&service, bucket, &nested_key, b"nested").await;
        put(&service, bucket, &format!("a/{}", first.version_id), b"sibling").await;

        let (_, reader) = service.get_latest(bucket, "a").await.unwrap();
        assert_eq!(read_all(reader).await, b"short");
        let (_, reader) = service.get_latest(bucket, &nested_key).await.unwrap();
        assert_eq!(read_all(reader).await, b"nested");
    }

    #[tokio::test]
    async fn missing_bytes_surface_as_corrupt_state() {
        let env = TestEnv::new().await;
        let service = env.object_service();
        let bucket = Uuid::new_v4();
        let outcome = put(&service, bucket, "k", b"data").await;

        std::fs::remove_file(&outcome.object.storage_path).unwrap();

        let err = service.get_latest(bucket, "k").await.err().unwrap();
        assert!(matches!(err, StoreError::CorruptState { .. }));
        let err = service
            .get_version(bucket, "k", &outcome.version_id)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, StoreError::CorruptState { .. }));
    }

    #[tokio::test]
    async fn delete_only_version_removes_everything() {
        let env = TestEnv::new().await;
        let service = env.object_service();
        let bucket = Uuid::new_v4();
        let outcome = put(&service, bucket, "img/a", b"a").await;

        let deleted = service.delete(bucket, "img/a").await.unwrap();
        assert_eq!(deleted.id, outcome.object.id);

        assert!(service.get_latest(bucket, "img/a").await.err().unwrap().is_not_found());
        assert_eq!(service.list(bucket, "", 1, 50).await.unwrap().total_count, 0);
        assert!(service.list_versions(bucket, "img/a").await.unwrap().is_empty());
        assert!(files_under(env.layout.root()).is_empty());

        let err = service.delete(bucket, "img/a").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_promotes_previous_version() {
        let env = TestEnv::new().await;
        let service = env.object_service();
        let bucket = Uuid::new_v4();
        let first = put(&service, bucket, "k", b"one").await;
        let second = put(&service, bucket, "k", b"two").await;

        service.delete(bucket, "k").await.unwrap();

        let (latest, reader) = service.get_latest(bucket, "k").await.unwrap();
        assert_eq!(latest.version_id, first.version_id);
        assert_eq!(read_all(reader).await, b"one");

        let versions = service.list_versions(bucket, "k").await.unwrap();
        assert_eq!(versions.len(), 1);
        assert!(
            service
                .get_version(bucket, "k", &second.version_id)
                .await
                .err()
                .unwrap()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn delete_tolerates_already_missing_bytes() {
        let env = TestEnv::new().await;
        let service = env.object_service();
        let bucket = Uuid::new_v4();
        let outcome = put(&service, bucket, "k", b"data").await;
        std::fs::remove_file(&outcome.object.storage_path).unwrap();

        service.delete(bucket, "k").await.unwrap();
        assert!(service.list_versions(bucket, "k").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn versions_are_not_shared_across_buckets() {
        let env = TestEnv::new().await;
        let service = env.object_service();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let in_a = put(&service, a, "report.pdf", b"a").await;
        put(&service, b, "report.pdf", b"b").await;

        let err = service
            .get_version(b, "report.pdf", &in_a.version_id)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, StoreError::VersionNotFound { .. }));
    }

    #[tokio::test]
    async fn latest_stays_unique_across_uploads_and_deletes() {
        let env = TestEnv::new().await;
        let service = env.object_service();
        let bucket = Uuid::new_v4();

        for step in 0..6 {
            put(&service, bucket, "k", format!("v{step}").as_bytes()).await;
            if step % 2 == 1 {
                service.delete(bucket, "k").await.unwrap();
            }
            let latest = service
                .list_versions(bucket, "k")
                .await
                .unwrap()
                .into_iter()
                .filter(|v| v.is_latest)
                .count();
            assert_eq!(latest, 1);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_uploads_leave_one_latest() {
        let env = TestEnv::new().await;
        let service = ObjectService::new(
            Arc::new(env.metadata_store()),
            Arc::new(LocalContentStore::new(env.layout.root())),
            env.layout.clone(),
            ObjectServiceConfig {
                conflict_retries: 50,
                retry_backoff: Duration::from_millis(1),
            },
        );
        let bucket = Uuid::new_v4();

        let mut tasks = Vec::new();
        for i in 0..6 {
            let service = service.clone();
            tasks.push(tokio::spawn(async move {
                service
                    .upload(
                        bucket,
                        "hot",
                        stream_from(format!("writer {i}").as_bytes(), 4),
                        UploadRequest::default(),
                    )
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let versions = service.list_versions(bucket, "hot").await.unwrap();
        assert_eq!(versions.len(), 6);
        assert_eq!(versions.iter().filter(|v| v.is_latest).count(), 1);
        assert_eq!(files_under(env.layout.root()).len(), 6);
    }
}
