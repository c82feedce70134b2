//! Caller identity.
//!
//! Authentication happens upstream: a gateway verifies the caller and
//! forwards the result in `x-caller-id` / `x-caller-name`. This service
//! trusts those headers and only checks that the id is well formed.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::errors::AppError;

pub const CALLER_ID_HEADER: &str = "x-caller-id";
pub const CALLER_NAME_HEADER: &str = "x-caller-name";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallerIdentity {
    pub id: Uuid,
    pub username: Option<String>,
}

impl CallerIdentity {
    pub fn new(id: Uuid, username: impl Into<String>) -> Self {
        Self {
            id,
            username: Some(username.into()),
        }
    }
}

/// Extractor yielding the caller, or `None` for anonymous requests.
#[derive(Clone, Debug)]
pub struct Caller(pub Option<CallerIdentity>);

impl Caller {
    pub fn identity(&self) -> Option<&CallerIdentity> {
        self.0.as_ref()
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw_id) = parts.headers.get(CALLER_ID_HEADER) else {
            return Ok(Caller(None));
        };

        let id = raw_id
            .to_str()
            .ok()
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .ok_or_else(|| AppError::unauthorized("malformed caller identity"))?;

        let username = parts
            .headers
            .get(CALLER_NAME_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        Ok(Caller(Some(CallerIdentity { id, username })))
    }
}
