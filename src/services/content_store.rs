//! Byte payload storage.
//!
//! `ContentStore` owns the lifecycle of bytes on disk. Writes stream through
//! an MD5 context into a hidden temp file which is renamed into place only
//! after flush and fsync, so the reported size and digest always describe
//! exactly what is durable and readers never observe a partial file.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use md5::Context;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    pin::Pin,
};
use tokio::{
    fs::{self, File},
    io::{AsyncRead, AsyncWriteExt},
};
use tracing::debug;
use uuid::Uuid;

/// Incoming payload, consumed chunk by chunk.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Sequential reader over a stored payload. Dropping it releases the file.
pub type ContentReader = Pin<Box<dyn AsyncRead + Send>>;

/// What actually landed on disk.
#[derive(Debug, Clone)]
pub struct WrittenContent {
    pub size: i64,
    pub digest: [u8; 16],
}

impl WrittenContent {
    /// Lowercase hex digest, used as the ETag.
    pub fn etag(&self) -> String {
        format!("{:x}", md5::Digest(self.digest))
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Stream `body` to `target`, returning the measured size and MD5.
    ///
    /// The parent directory must already exist. On error nothing is left at
    /// `target`.
    async fn write(&self, target: &Path, body: ByteStream) -> io::Result<WrittenContent>;

    /// Open a stored payload for sequential reading.
    async fn open(&self, location: &Path) -> io::Result<ContentReader>;

    /// Remove a payload. Returns `Ok(false)` when it was already gone.
    async fn remove(&self, location: &Path) -> io::Result<bool>;
}

/// Payloads stored as plain files beneath a local root directory.
#[derive(Clone, Debug)]
pub struct LocalContentStore {
    root: PathBuf,
}

impl LocalContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the temp file, recreating the parent once if a concurrent
    /// delete pruned it in the meantime.
    async fn create_temp(&self, parent: &Path) -> io::Result<(PathBuf, File)> {
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        match File::create(&tmp_path).await {
            Ok(file) => Ok((tmp_path, file)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                fs::create_dir_all(parent).await?;
                let file = File::create(&tmp_path).await?;
                Ok((tmp_path, file))
            }
            Err(err) => Err(err),
        }
    }

    /// Recursively remove empty directories up to the storage root.
    ///
    /// Stops at the first non-empty or missing directory.
    async fn prune_empty_dirs(&self, start: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(&self.root) && current != self.root {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ContentStore for LocalContentStore {
    async fn write(&self, target: &Path, mut body: ByteStream) -> io::Result<WrittenContent> {
        let parent = target.parent().ok_or_else(|| {
            io::Error::new(ErrorKind::Other, "object path missing parent directory")
        })?;
        let (tmp_path, mut file) = self.create_temp(parent).await?;

        let mut size: i64 = 0;
        let mut digest = Context::new();
        let copied: io::Result<()> = async {
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                size += chunk.len() as i64;
                digest.consume(&chunk);
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            file.sync_all().await?;
            Ok(())
        }
        .await;
        drop(file);

        if let Err(err) = copied {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }

        if let Err(err) = fs::rename(&tmp_path, target).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }

        Ok(WrittenContent {
            size,
            digest: digest.compute().0,
        })
    }

    async fn open(&self, location: &Path) -> io::Result<ContentReader> {
        let file = File::open(location).await?;
        Ok(Box::pin(file))
    }

    async fn remove(&self, location: &Path) -> io::Result<bool> {
        let removed = match fs::remove_file(location).await {
            Ok(_) => {
                debug!("removed physical file {}", location.display());
                true
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", location.display());
                false
            }
            Err(err) => return Err(err),
        };

        if let Some(parent) = location.parent() {
            self.prune_empty_dirs(parent).await;
        }
        Ok(removed)
    }
}

/// Adapt an in-memory buffer into a `ByteStream`, split into `chunk` sized
/// pieces.
#[cfg(test)]
pub fn stream_from(data: &[u8], chunk: usize) -> ByteStream {
    let chunks: Vec<io::Result<Bytes>> = data
        .chunks(chunk.max(1))
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    Box::pin(futures::stream::iter(chunks))
}
