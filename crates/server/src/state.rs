//! Application state shared across handlers.

use crate::metrics::StatsSink;
use silo_core::config::{AppConfig, CompressionConfig};
use silo_storage::{Backend, ChunkRepository};
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Chunk repository over the configured backend.
    pub repo: ChunkRepository,
    /// Statistics sink.
    pub stats: Arc<dyn StatsSink>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(config: AppConfig, backend: Arc<dyn Backend>, stats: Arc<dyn StatsSink>) -> Self {
        if config.server.compression != CompressionConfig::None {
            tracing::info!(
                compression = ?config.server.compression,
                "Uploads will be compressed; compressed chunks cannot be downloaded by this node"
            );
        }
        Self {
            config: Arc::new(config),
            repo: ChunkRepository::new(backend),
            stats,
        }
    }

    /// Compression applied to uploaded chunk bytes.
    pub fn compression(&self) -> CompressionConfig {
        self.config.server.compression
    }
}
