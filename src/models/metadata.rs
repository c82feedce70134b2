//! User-defined and system attributes attached to object versions.
//!
//! Attributes are an open string-keyed bag, but values are restricted to
//! scalars (strings, numbers, booleans). Nested values are rejected at the
//! boundary instead of being stringified silently.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::services::error::{StoreError, StoreResult};

/// Attribute bag stored alongside each object version.
pub type Attributes = BTreeMap<String, Value>;

const MAX_ATTRIBUTE_NAME_LEN: usize = 128;
const MAX_ATTRIBUTE_VALUE_LEN: usize = 2048;

/// Attributes the service derives itself for every upload.
#[derive(Debug, Clone)]
pub struct SystemAttributes {
    pub upload_time: DateTime<Utc>,
    pub original_filename: String,
    pub file_size: i64,
    pub content_type: String,
    pub uploaded_by: Option<String>,
    pub uploaded_by_id: Option<String>,
    pub user_agent: Option<String>,
    pub client_ip: Option<String>,
}

impl SystemAttributes {
    /// Merge into caller attributes. System values win on name clashes.
    pub fn merge_into(self, mut attrs: Attributes) -> Attributes {
        attrs.insert(
            "upload_time".into(),
            Value::String(self.upload_time.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        attrs.insert(
            "original_filename".into(),
            Value::String(self.original_filename),
        );
        attrs.insert("file_size".into(), Value::from(self.file_size));
        attrs.insert("content_type".into(), Value::String(self.content_type));
        if let Some(name) = self.uploaded_by {
            attrs.insert("uploaded_by".into(), Value::String(name));
        }
        if let Some(id) = self.uploaded_by_id {
            attrs.insert("uploaded_by_id".into(), Value::String(id));
        }
        if let Some(agent) = self.user_agent {
            attrs.insert("user_agent".into(), Value::String(agent));
        }
        if let Some(ip) = self.client_ip {
            attrs.insert("client_ip".into(), Value::String(ip));
        }
        attrs
    }
}

/// Lowercase a header-style name and turn `-` into `_`.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace('-', "_")
}

/// Check an attribute name: non-empty, bounded, `[a-z0-9_.-]` only.
pub fn validate_name(name: &str) -> StoreResult<()> {
    if name.is_empty() || name.len() > MAX_ATTRIBUTE_NAME_LEN {
        return Err(StoreError::InvalidMetadata(format!(
            "attribute name must be 1-{} bytes",
            MAX_ATTRIBUTE_NAME_LEN
        )));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.'))
    {
        return Err(StoreError::InvalidMetadata(format!(
            "attribute name `{}` contains unsupported characters",
            name
        )));
    }
    Ok(())
}

/// Validate a single value. Only strings, numbers and booleans pass.
pub fn validate_value(name: &str, value: &Value) -> StoreResult<()> {
    match value {
        Value::String(s) if s.len() > MAX_ATTRIBUTE_VALUE_LEN => Err(
            StoreError::InvalidMetadata(format!("attribute `{}` is too long", name)),
        ),
        Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(()),
        Value::Null => Err(StoreError::InvalidMetadata(format!(
            "attribute `{}` is null",
            name
        ))),
        Value::Array(_) | Value::Object(_) => Err(StoreError::InvalidMetadata(format!(
            "attribute `{}` must be a scalar",
            name
        ))),
    }
}

/// Insert one attribute after normalizing and validating it.
pub fn insert_attribute(attrs: &mut Attributes, name: &str, value: Value) -> StoreResult<()> {
    let name = normalize_name(name);
    validate_name(&name)?;
    validate_value(&name, &value)?;
    attrs.insert(name, value);
    Ok(())
}

/// Parse a JSON object of scalar attributes (the `x-object-metadata` header).
pub fn parse_json_attributes(raw: &str) -> StoreResult<Attributes> {
    let parsed: Value = serde_json::from_str(raw)
        .map_err(|err| StoreError::InvalidMetadata(format!("invalid JSON: {}", err)))?;
    let Value::Object(map) = parsed else {
        return Err(StoreError::InvalidMetadata(
            "metadata must be a JSON object".into(),
        ));
    };

    let mut attrs = Attributes::new();
    for (name, value) in map {
        insert_attribute(&mut attrs, &name, value)?;
    }
    Ok(attrs)
}

/// Render a scalar attribute for use in a response header.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
