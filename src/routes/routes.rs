//! Route table for the object store API.
//!
//! ## Structure
//! - **Bucket endpoints**
//!   - `POST   /buckets` - create a bucket owned by the caller
//!   - `GET    /buckets` - list the caller's buckets
//!   - `DELETE /buckets/{bucket}` - delete an empty bucket
//!
//! - **Object endpoints**
//!   - `GET    /buckets/{bucket}/objects` - list latest versions (prefix, page, page_size)
//!   - `PUT    /buckets/{bucket}/objects/{*key}` - upload a new version
//!   - `GET    /buckets/{bucket}/objects/{*key}` - download latest or `?version_id=`
//!   - `HEAD   /buckets/{bucket}/objects/{*key}` - headers only
//!   - `DELETE /buckets/{bucket}/objects/{*key}` - delete the latest version
//!   - `GET    /buckets/{bucket}/versions/{*key}` - version history
//!
//! The wildcard `*key` allows nested keys like `photos/2025/img.jpg`.

use crate::{
    handlers::{
        bucket_handlers::{create_bucket, delete_bucket, list_buckets},
        health_handlers::{healthz, readyz},
        object_handlers::{
            delete_object, get_object, head_object, list_objects, list_versions, upload_object,
        },
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{delete, get, put},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/buckets", get(list_buckets).post(create_bucket))
        .route("/buckets/{bucket}", delete(delete_bucket))
        .route("/buckets/{bucket}/objects", get(list_objects))
        .route(
            "/buckets/{bucket}/objects/{*key}",
            put(upload_object)
                .get(get_object)
                .head(head_object)
                .delete(delete_object),
        )
        .route("/buckets/{bucket}/versions/{*key}", get(list_versions))
}
