//! On-disk layout for object payloads.
//!
//! Every version gets its own file at `root/{bucket_id}/{key}/@{version_id}`.
//! Keys may contain `/`, which simply nests directories. Key segments may not
//! start with `@`, so a version file never sits where another key needs a
//! directory.

use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::fs;
use uuid::Uuid;

use super::error::{StoreError, StoreResult};

const MAX_OBJECT_KEY_LEN: usize = 1024;
/// Longest single path component most filesystems accept (NAME_MAX).
const MAX_KEY_SEGMENT_LEN: usize = 255;
/// Marks the version component of a payload path.
const VERSION_MARKER: char = '@';

#[derive(Clone, Debug)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding all payloads of one bucket.
    pub fn bucket_root(&self, bucket_id: Uuid) -> PathBuf {
        self.root.join(bucket_id.to_string())
    }

    /// Location of one version's payload. Pure; touches nothing on disk.
    pub fn derive(&self, bucket_id: Uuid, key: &str, version_id: &str) -> PathBuf {
        let mut path = self.bucket_root(bucket_id);
        for segment in key.split('/') {
            path.push(segment);
        }
        path.push(format!("{}{}", VERSION_MARKER, version_id));
        path
    }

    /// Create the parent directory chain of `path` if it is missing.
    pub async fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        let parent = path.parent().ok_or_else(|| {
            io::Error::new(ErrorKind::Other, "object path missing parent directory")
        })?;
        fs::create_dir_all(parent).await
    }
}

/// Basic key validation to keep derived paths inside the storage root.
///
/// Rejects empty keys, absolute keys, empty or dot segments, control
/// characters and backslashes. Segments must fit in one file name and may
/// not start with the version marker `@`.
pub fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
        return Err(StoreError::InvalidObjectKey);
    }
    if key
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
    {
        return Err(StoreError::InvalidObjectKey);
    }
    if key.split('/').any(|segment| {
        segment.is_empty()
            || segment == "."
            || segment == ".."
            || segment.len() > MAX_KEY_SEGMENT_LEN
            || segment.starts_with(VERSION_MARKER)
    }) {
        return Err(StoreError::InvalidObjectKey);
    }
    Ok(())
}
