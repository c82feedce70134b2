//! HTTP handlers for bucket operations.

use crate::{
    auth::Caller,
    errors::AppError,
    models::bucket::{Bucket, CreateBucketRequest},
    services::error::StoreError,
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

/// POST `/buckets` - create a bucket owned by the caller.
pub async fn create_bucket(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<CreateBucketRequest>,
) -> Result<(StatusCode, Json<Bucket>), AppError> {
    let owner = caller.identity().ok_or(StoreError::Unauthenticated)?;
    let bucket = state
        .buckets
        .create_bucket(owner, &payload.name, payload.public, payload.versioning)
        .await?;
    Ok((StatusCode::CREATED, Json(bucket)))
}

/// GET `/buckets` - buckets owned by the caller.
pub async fn list_buckets(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<Bucket>>, AppError> {
    let owner = caller.identity().ok_or(StoreError::Unauthenticated)?;
    Ok(Json(state.buckets.list_buckets(owner.id).await?))
}

/// DELETE `/buckets/{bucket}` - delete an empty bucket.
pub async fn delete_bucket(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    caller: Caller,
) -> Result<StatusCode, AppError> {
    state
        .buckets
        .delete_bucket(caller.identity(), &bucket)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
