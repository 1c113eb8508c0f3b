//! Module storage seam.
//!
//! Containers are created from a content digest; the storage collaborator
//! resolves the digest to the module binary. Storage format and retrieval
//! are its concern, the runtime only consumes the returned buffer.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};

use crate::error::StoreError;

/// Result type alias for storage calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Resolves content digests to module binaries.
#[async_trait]
pub trait ModuleStore: Send + Sync {
    /// Resolves a hex sha256 digest (optionally `sha256:`-prefixed) to the
    /// module binary.
    async fn resolve(&self, digest: &str) -> StoreResult<Bytes>;
}

/// In-memory content-addressed store keyed by hex sha256.
///
/// Used by tests and by embedded deployments that receive modules over a
/// side channel rather than a filesystem.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a module binary and returns its hex digest.
    pub fn insert(&self, bytes: impl Into<Bytes>) -> String {
        let bytes = bytes.into();
        let digest = format!("{:x}", Sha256::digest(&bytes));
        if let Ok(mut blobs) = self.blobs.write() {
            blobs.insert(digest.clone(), bytes);
        }
        digest
    }

    /// Removes a module binary by digest.
    pub fn remove(&self, digest: &str) {
        let key = normalize(digest);
        if let Ok(mut blobs) = self.blobs.write() {
            blobs.remove(key);
        }
    }
}

fn normalize(digest: &str) -> &str {
    digest.strip_prefix("sha256:").unwrap_or(digest)
}

#[async_trait]
impl ModuleStore for MemoryStore {
    async fn resolve(&self, digest: &str) -> StoreResult<Bytes> {
        let key = normalize(digest);
        let blobs = self
            .blobs
            .read()
            .map_err(|_| StoreError::Io("lock poisoned".to_string()))?;
        blobs
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}
