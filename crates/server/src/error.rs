//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use silo_storage::StorageError;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("chunk not found: {0}")]
    NotFound(String),

    #[error("chunk already exists: {0}")]
    ChunkAlreadyExists(String),

    #[error("invalid chunk identifier: {0}")]
    InvalidChunkId(String),

    #[error("missing mandatory metadata: {0}")]
    MissingMandatoryMetadata(String),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("incomplete body: expected {expected} bytes, got {received}")]
    IncompleteBody { expected: u64, received: u64 },

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("range starts at {start}, chunk holds {size} bytes")]
    RangeNotSatisfiable { start: u64, size: u64 },

    #[error("compression not managed: {0}")]
    CompressionNotManaged(String),

    #[error("invalid listing marker: {0}")]
    InvalidListingMarker(String),

    #[error("invalid listing prefix: {0}")]
    InvalidListingPrefix(String),

    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("storage error: {0}")]
    Storage(#[source] StorageError),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(name) => Self::NotFound(name),
            StorageError::AlreadyExists(name) => Self::ChunkAlreadyExists(name),
            StorageError::InvalidListingMarker(m) => Self::InvalidListingMarker(m),
            StorageError::InvalidListingPrefix(p) => Self::InvalidListingPrefix(p),
            other => Self::Storage(other),
        }
    }
}

impl From<silo_core::Error> for ApiError {
    fn from(err: silo_core::Error) -> Self {
        match err {
            silo_core::Error::InvalidChunkId(msg) => Self::InvalidChunkId(msg),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::ChunkAlreadyExists(_) => "chunk_already_exists",
            Self::InvalidChunkId(_) => "invalid_chunk_id",
            Self::MissingMandatoryMetadata(_) => "missing_mandatory_metadata",
            Self::ChecksumMismatch { .. } => "checksum_mismatch",
            Self::IncompleteBody { .. } => "incomplete_body",
            Self::InvalidRange(_) => "invalid_range",
            Self::RangeNotSatisfiable { .. } => "range_not_satisfiable",
            Self::CompressionNotManaged(_) => "compression_not_managed",
            Self::InvalidListingMarker(_) => "invalid_listing_marker",
            Self::InvalidListingPrefix(_) => "invalid_listing_prefix",
            Self::MethodNotAllowed(_) => "method_not_allowed",
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal_error",
            Self::Storage(_) => "storage_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ChunkAlreadyExists(_) => StatusCode::CONFLICT,
            Self::InvalidChunkId(_)
            | Self::MissingMandatoryMetadata(_)
            | Self::ChecksumMismatch { .. }
            | Self::IncompleteBody { .. }
            | Self::InvalidRange(_)
            | Self::InvalidListingMarker(_)
            | Self::InvalidListingPrefix(_)
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::CompressionNotManaged(_) | Self::Internal(_) | Self::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
