//! Shared state handed to every handler.

use sqlx::SqlitePool;
use std::{path::PathBuf, sync::Arc};

use crate::services::{bucket_service::BucketService, object_service::ObjectService};

#[derive(Clone)]
pub struct AppState {
    /// Pool behind both services; used directly by the readiness probe.
    pub db: Arc<SqlitePool>,
    pub buckets: BucketService,
    pub objects: ObjectService,
    pub storage_root: PathBuf,
    /// Upper bound applied to `page_size` before listing.
    pub max_page_size: i64,
}
