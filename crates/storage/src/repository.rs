//! Chunk repository: the policy layer between request handlers and a backend.
//!
//! The repository normalizes backend errors so callers only ever see
//! [`StorageError::NotFound`] for missing chunks, and validates listing
//! parameters before the backend is asked anything.

use crate::error::{StorageError, StorageResult};
use crate::traits::{Backend, ChunkReader, ChunkWriter, ListSlice};
use silo_core::is_hex_string;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Chunk repository over one backend.
#[derive(Clone)]
pub struct ChunkRepository {
    backend: Arc<dyn Backend>,
}

impl ChunkRepository {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// The underlying backend.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Bind the volume to a namespace and URL.
    pub async fn lock(&self, namespace: &str, url: &str) -> StorageResult<()> {
        self.backend.lock(namespace, url).await
    }

    /// Check whether a chunk exists.
    ///
    /// Backend failures read as "absent"; they are logged, not returned.
    #[instrument(skip(self))]
    pub async fn has(&self, name: &str) -> bool {
        match self.backend.has(name).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, backend = self.backend.backend_name(), "existence check failed");
                false
            }
        }
    }

    pub async fn del(&self, name: &str) -> StorageResult<()> {
        self.backend.del(name).await.map_err(|e| normalize(name, e))
    }

    pub async fn get(&self, name: &str) -> StorageResult<Box<dyn ChunkReader>> {
        self.backend.get(name).await.map_err(|e| normalize(name, e))
    }

    pub async fn put(&self, name: &str) -> StorageResult<Box<dyn ChunkWriter>> {
        self.backend.put(name).await
    }

    pub async fn link(&self, from: &str, to: &str) -> StorageResult<Box<dyn ChunkWriter>> {
        self.backend.link(from, to).await
    }

    /// List chunk names.
    ///
    /// A non-empty `marker` or `prefix` must be hexadecimal.
    pub async fn list(&self, marker: &str, prefix: &str, max: usize) -> StorageResult<ListSlice> {
        if !marker.is_empty() && !is_hex_string(marker) {
            return Err(StorageError::InvalidListingMarker(marker.to_string()));
        }
        if !prefix.is_empty() && !is_hex_string(prefix) {
            return Err(StorageError::InvalidListingPrefix(prefix.to_string()));
        }
        self.backend.list(marker, prefix, max).await
    }
}

fn normalize(name: &str, err: StorageError) -> StorageError {
    if err.is_not_found() {
        StorageError::NotFound(name.to_string())
    } else {
        err
    }
}
