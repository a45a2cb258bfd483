//! The `BlobStore` abstraction standing in for the external object store.
//!
//! Production backing is out of scope; `LocalFsBlobStore` is the
//! development/test implementation, keying objects by path-like strings
//! under a root directory.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::instrument;

use crate::error::BlobStoreError;

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>, BlobStoreError>;
    async fn put(&self, key: &str, data: &[u8]) -> Result<(), BlobStoreError>;
    async fn exists(&self, key: &str) -> bool;
}

/// Local-filesystem-backed `BlobStore`. Keys are joined onto `root` as
/// relative paths; intermediate directories are created on `put`.
pub struct LocalFsBlobStore {
    root: PathBuf,
}

impl LocalFsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl BlobStore for LocalFsBlobStore {
    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: &str) -> Result<Vec<u8>, BlobStoreError> {
        let path = self.resolve(key);
        tokio::fs::read(&path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => BlobStoreError::NotFound(key.to_string()),
                _ => BlobStoreError::Io {
                    key: key.to_string(),
                    source: e,
                },
            })
    }

    #[instrument(skip(self, data), fields(key = %key, bytes = data.len()))]
    async fn put(&self, key: &str, data: &[u8]) -> Result<(), BlobStoreError> {
        let path = self.resolve(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BlobStoreError::Io {
                    key: key.to_string(),
                    source: e,
                })?;
        }
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| BlobStoreError::Io {
                key: key.to_string(),
                source: e,
            })
    }

    async fn exists(&self, key: &str) -> bool {
        tokio::fs::try_exists(self.resolve(key)).await.unwrap_or(false)
    }
}

/// Convenience for callers that already hold a filesystem path and want a
/// key relative to an arbitrary root, mirroring how the blob-store key
/// scheme in §6 is laid out (`indices/{retriever}/{fingerprint}.bin`, etc).
pub fn join_key(parts: &[&str]) -> String {
    parts.join("/")
}
