//! Storage error types.

use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("object already exists: {0}")]
    AlreadyExists(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid listing marker: {0}")]
    InvalidListingMarker(String),

    #[error("invalid listing prefix: {0}")]
    InvalidListingPrefix(String),

    #[error("volume already locked by {namespace} at {url}")]
    Locked { namespace: String, url: String },

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// Whether this error is, or wraps, a "not found" condition.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Io(e) => {
                e.kind() == std::io::ErrorKind::NotFound
                    || e.get_ref()
                        .and_then(|inner| inner.downcast_ref::<StorageError>())
                        .is_some_and(StorageError::is_not_found)
            }
            _ => false,
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
