//! Chunk storage abstraction and backends for Silo.
//!
//! This crate provides:
//! - Transactional writes: nothing is visible before commit
//! - Per-object attributes stored next to the bytes
//! - A repository layer normalizing backend errors
//! - Backends: local filesystem and in-memory

pub mod backends;
pub mod error;
pub mod repository;
pub mod traits;

pub use backends::{filesystem::FilesystemBackend, memory::MemoryBackend};
pub use error::{StorageError, StorageResult};
pub use repository::ChunkRepository;
pub use traits::{Backend, ChunkReader, ChunkWriter, ListSlice};

use silo_core::config::StorageConfig;
use std::sync::Arc;

/// Create a backend from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn Backend>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        StorageConfig::Filesystem {
            path,
            hash_width,
            hash_depth,
        } => {
            let backend = FilesystemBackend::new(path, *hash_width, *hash_depth).await?;
            Ok(Arc::new(backend))
        }
        StorageConfig::Memory => Ok(Arc::new(MemoryBackend::new())),
    }
}
