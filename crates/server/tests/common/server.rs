//! Server test utilities.

use silo_core::config::{AppConfig, StorageConfig};
use silo_server::{AppState, StatsSink, create_router};
use silo_storage::{Backend, FilesystemBackend, MemoryBackend};
use std::sync::Arc;
use tempfile::TempDir;

use super::mocks::RecordingStats;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub stats: Arc<RecordingStats>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a test server over in-memory storage.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server over in-memory storage with config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = AppConfig::for_testing();
        modifier(&mut config);
        Self::build(config, Arc::new(MemoryBackend::new()))
    }

    /// Create a test server over the given backend.
    pub async fn with_backend(backend: Arc<dyn Backend>) -> Self {
        Self::build(AppConfig::for_testing(), backend)
    }

    /// Create a test server over a filesystem volume in a temporary directory.
    pub async fn filesystem() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let path = temp_dir.path().join("volume");
        let backend = FilesystemBackend::new(&path, 2, 1)
            .await
            .expect("Failed to create storage backend");

        let mut config = AppConfig::for_testing();
        config.storage = StorageConfig::Filesystem {
            path,
            hash_width: 2,
            hash_depth: 1,
        };
        Self::build_in(config, Arc::new(backend), temp_dir)
    }

    fn build(config: AppConfig, backend: Arc<dyn Backend>) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        Self::build_in(config, backend, temp_dir)
    }

    fn build_in(config: AppConfig, backend: Arc<dyn Backend>, temp_dir: TempDir) -> Self {
        let stats = Arc::new(RecordingStats::default());
        let sink: Arc<dyn StatsSink> = stats.clone();
        let state = AppState::new(config, backend, sink);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            stats,
            _temp_dir: temp_dir,
        }
    }
}
