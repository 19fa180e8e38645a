//! Chunk data paths between request handlers and the repository.

pub mod download;
pub mod range;
pub mod upload;

pub use download::{ChunkDownload, LimitedReader};
pub use range::{ByteRange, ResolvedRange};
pub use upload::{UploadOutcome, metadata_from_headers, upload_chunk};
