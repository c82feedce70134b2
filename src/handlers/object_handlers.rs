//! HTTP handlers for object operations.
//! Streams object bodies to avoid buffering in memory and delegates storage
//! concerns to `ObjectService`.

use crate::{
    auth::Caller,
    errors::AppError,
    models::{
        metadata::{self, Attributes},
        object::{DEFAULT_CONTENT_TYPE, ObjectVersion},
    },
    services::{
        content_store::ByteStream,
        error::StoreError,
        metadata_store::DEFAULT_PAGE_SIZE,
        object_service::UploadRequest,
    },
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, FromRequestParts, Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{convert::Infallible, fmt::Write as _, io, net::SocketAddr};
use tokio_util::io::ReaderStream;

pub const VERSION_ID_HEADER: &str = "x-object-version-id";
pub const META_HEADER_PREFIX: &str = "x-object-meta-";
pub const METADATA_JSON_HEADER: &str = "x-object-metadata";
pub const ORIGINAL_FILENAME_HEADER: &str = "x-original-filename";
const CONTENT_MD5: HeaderName = HeaderName::from_static("content-md5");
const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";

/// Query params accepted when listing objects.
#[derive(Debug, Deserialize)]
pub struct ListObjectsQuery {
    pub prefix: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Optional version pin for reads.
#[derive(Debug, Deserialize)]
pub struct VersionQuery {
    pub version_id: Option<String>,
}

/// Who sent an upload, as far as the transport can tell.
///
/// The client address comes from `X-Forwarded-For` (first hop), then
/// `X-Real-IP`, then the socket peer when the server tracks it.
#[derive(Debug, Default)]
pub struct ClientInfo {
    pub user_agent: Option<String>,
    pub client_ip: Option<String>,
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = header_str(&parts.headers, FORWARDED_FOR).and_then(|v| {
            v.split(',')
                .map(str::trim)
                .find(|hop| !hop.is_empty())
                .map(str::to_string)
        });
        let client_ip = forwarded
            .or_else(|| header_str(&parts.headers, REAL_IP))
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            });

        Ok(ClientInfo {
            user_agent: header_str(&parts.headers, header::USER_AGENT.as_str()),
            client_ip,
        })
    }
}

#[derive(Serialize)]
struct ListObjectsResponse {
    objects: Vec<ObjectVersion>,
    total_count: i64,
    page: i64,
    page_size: i64,
}

#[derive(Serialize)]
struct ListVersionsResponse {
    versions: Vec<ObjectVersion>,
    count: usize,
    key: String,
    bucket: String,
}

/// PUT `/buckets/{bucket}/objects/{*key}` - store a new version.
pub async fn upload_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    caller: Caller,
    client: ClientInfo,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, AppError> {
    let bucket_rec = state
        .buckets
        .resolve_owned(caller.identity(), &bucket)
        .await?;

    let request = UploadRequest {
        content_type: header_str(&headers, header::CONTENT_TYPE.as_str()),
        attributes: caller_attributes(&headers)?,
        declared_md5: header_str(&headers, CONTENT_MD5.as_str()),
        original_filename: header_str(&headers, ORIGINAL_FILENAME_HEADER),
        caller: caller.0.clone(),
        user_agent: client.user_agent,
        client_ip: client.client_ip,
    };

    let stream: ByteStream = Box::pin(
        body.into_data_stream()
            .map(|chunk| chunk.map_err(io::Error::other)),
    );

    let outcome = state
        .objects
        .upload(bucket_rec.id, &key, stream, request)
        .await?;

    let mut response = (StatusCode::CREATED, Json(&outcome)).into_response();
    let resp_headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", outcome.object.etag)) {
        resp_headers.insert(header::ETAG, value);
    }
    if let Ok(value) = HeaderValue::from_str(&outcome.version_id) {
        resp_headers.insert(VERSION_ID_HEADER, value);
    }
    Ok(response)
}

/// GET `/buckets/{bucket}/objects/{*key}` - stream the latest or a pinned version.
pub async fn get_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    Query(q): Query<VersionQuery>,
    caller: Caller,
) -> Result<Response, AppError> {
    let bucket_rec = state.buckets.resolve(caller.identity(), &bucket).await?;

    let (meta, reader) = match q.version_id.as_deref() {
        Some(version_id) => {
            state
                .objects
                .get_version(bucket_rec.id, &key, version_id)
                .await?
        }
        None => state.objects.get_latest(bucket_rec.id, &key).await?,
    };

    let mut response = Response::new(Body::from_stream(ReaderStream::new(reader)));
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &meta);
    Ok(response)
}

/// HEAD `/buckets/{bucket}/objects/{*key}` - same headers as GET but no body.
pub async fn head_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    Query(q): Query<VersionQuery>,
    caller: Caller,
) -> Result<Response, AppError> {
    let bucket_rec = state.buckets.resolve(caller.identity(), &bucket).await?;

    let meta = match q.version_id.as_deref() {
        Some(version_id) => {
            state
                .objects
                .head_version(bucket_rec.id, &key, version_id)
                .await?
        }
        None => state.objects.head_latest(bucket_rec.id, &key).await?,
    };

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &meta);
    Ok(response)
}

/// DELETE `/buckets/{bucket}/objects/{*key}` - delete the latest version.
pub async fn delete_object(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    caller: Caller,
) -> Result<Response, AppError> {
    let bucket_rec = state
        .buckets
        .resolve_owned(caller.identity(), &bucket)
        .await?;
    let deleted = state.objects.delete(bucket_rec.id, &key).await?;

    let mut response = StatusCode::NO_CONTENT.into_response();
    if let Ok(value) = HeaderValue::from_str(&deleted.version_id) {
        response.headers_mut().insert(VERSION_ID_HEADER, value);
    }
    Ok(response)
}

/// GET `/buckets/{bucket}/objects` - list latest versions, supports ?prefix=&page=&page_size=
pub async fn list_objects(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    Query(q): Query<ListObjectsQuery>,
    caller: Caller,
) -> Result<Response, AppError> {
    let bucket_rec = state.buckets.resolve(caller.identity(), &bucket).await?;

    let page_size = q
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .min(state.max_page_size);
    let result = state
        .objects
        .list(
            bucket_rec.id,
            q.prefix.as_deref().unwrap_or(""),
            q.page.unwrap_or(1),
            page_size,
        )
        .await?;

    Ok(Json(ListObjectsResponse {
        objects: result.objects,
        total_count: result.total_count,
        page: result.page,
        page_size: result.page_size,
    })
    .into_response())
}

/// GET `/buckets/{bucket}/versions/{*key}` - every live version, newest first.
pub async fn list_versions(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
    caller: Caller,
) -> Result<Response, AppError> {
    let bucket_rec = state.buckets.resolve(caller.identity(), &bucket).await?;
    let versions = state.objects.list_versions(bucket_rec.id, &key).await?;

    Ok(Json(ListVersionsResponse {
        count: versions.len(),
        versions,
        key,
        bucket,
    })
    .into_response())
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Collect caller attributes from `x-object-metadata` (JSON object) and
/// `x-object-meta-*` headers. Individual headers win over the JSON blob.
fn caller_attributes(headers: &HeaderMap) -> Result<Attributes, StoreError> {
    let mut attrs = match headers.get(METADATA_JSON_HEADER) {
        Some(raw) => {
            let raw = raw.to_str().map_err(|_| {
                StoreError::InvalidMetadata(format!("{} is not valid UTF-8", METADATA_JSON_HEADER))
            })?;
            metadata::parse_json_attributes(raw)?
        }
        None => Attributes::new(),
    };

    for (name, value) in headers {
        let Some(attr) = name.as_str().strip_prefix(META_HEADER_PREFIX) else {
            continue;
        };
        let value = value.to_str().map_err(|_| {
            StoreError::InvalidMetadata(format!("attribute `{}` is not valid UTF-8", attr))
        })?;
        metadata::insert_attribute(&mut attrs, attr, Value::String(value.to_string()))?;
    }
    Ok(attrs)
}

fn set_object_headers(headers: &mut HeaderMap, meta: &ObjectVersion) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&meta.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE)),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.size.max(0)));

    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", meta.etag)) {
        headers.insert(header::ETAG, value);
    }
    if let Some(value) = content_md5(&meta.etag).and_then(|v| HeaderValue::from_str(&v).ok()) {
        headers.insert(CONTENT_MD5, value);
    }
    if let Ok(value) = HeaderValue::from_str(
        &meta
            .created_at
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string(),
    ) {
        headers.insert(header::LAST_MODIFIED, value);
    }
    if let Ok(value) = HeaderValue::from_str(&content_disposition(meta.file_name())) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    if let Ok(value) = HeaderValue::from_str(&meta.version_id) {
        headers.insert(VERSION_ID_HEADER, value);
    }

    for (name, value) in meta.metadata.iter() {
        let header_name = format!("{}{}", META_HEADER_PREFIX, name.replace('_', "-"));
        let (Ok(name), Ok(value)) = (
            HeaderName::try_from(header_name),
            HeaderValue::from_str(&metadata::display_value(value)),
        ) else {
            continue;
        };
        headers.insert(name, value);
    }
}

/// `attachment` disposition with an ASCII-safe `filename` and, when the name
/// had to be altered, the exact name as RFC 5987 `filename*`.
fn content_disposition(name: &str) -> String {
    let safe = sanitize_filename(name);
    if safe == name {
        return format!("attachment; filename=\"{}\"", safe);
    }
    let mut encoded = String::with_capacity(name.len() * 3);
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            let _ = write!(encoded, "%{:02X}", byte);
        }
    }
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        safe, encoded
    )
}

/// Spaces become `-`, anything outside `[A-Za-z0-9_.-]` is dropped and
/// leading/trailing dots are trimmed. Falls back to `download`.
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('-'),
            c if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') => Some(c),
            _ => None,
        })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "download".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Base64 form of a hex MD5 ETag, as used by `Content-MD5`.
fn content_md5(etag: &str) -> Option<String> {
    if etag.len() != 32 || !etag.is_ascii() {
        return None;
    }
    let bytes = (0..etag.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&etag[i..i + 2], 16).ok())
        .collect::<Option<Vec<u8>>>()?;
    Some(general_purpose::STANDARD.encode(bytes))
}
