//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:6200").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Namespace this node serves. The storage volume is locked to it.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Public URL of this service, recorded in the volume lock.
    /// Defaults to the bind address.
    #[serde(default)]
    pub service_url: Option<String>,
    /// Compression applied to chunk bytes on upload.
    #[serde(default)]
    pub compression: CompressionConfig,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:6200".to_string()
}

fn default_namespace() -> String {
    "SILO".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            namespace: default_namespace(),
            service_url: None,
            compression: CompressionConfig::default(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl ServerConfig {
    /// The URL recorded in the volume lock.
    pub fn service_url(&self) -> &str {
        self.service_url.as_deref().unwrap_or(&self.bind)
    }
}

/// Compression applied to chunk bytes on upload.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompressionConfig {
    /// Store bytes as received.
    #[default]
    None,
    /// Pass bytes through a zlib encoder before storing them.
    Zlib,
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory of the volume.
        path: PathBuf,
        /// Number of identifier characters per fan-out directory level.
        #[serde(default = "default_hash_width")]
        hash_width: usize,
        /// Number of fan-out directory levels.
        #[serde(default = "default_hash_depth")]
        hash_depth: usize,
    },
    /// In-process memory storage. Nothing survives a restart.
    Memory,
}

fn default_hash_width() -> usize {
    3
}

fn default_hash_depth() -> usize {
    1
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/chunks"),
            hash_width: default_hash_width(),
            hash_depth: default_hash_depth(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::Filesystem {
                hash_width,
                hash_depth,
                ..
            } if *hash_width == 0 && *hash_depth > 0 => {
                Err("filesystem hash_width must be positive when hash_depth is set".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Create a test configuration backed by memory storage.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::Memory,
        }
    }

    /// Validate the whole configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.server.namespace.trim().is_empty() {
            return Err(crate::Error::Config(
                "server.namespace must not be empty".to_string(),
            ));
        }
        self.storage.validate().map_err(crate::Error::Config)
    }
}
