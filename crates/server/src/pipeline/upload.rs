//! Chunk upload: headers to attributes, streamed body, checksum, commit.

use crate::error::{ApiError, ApiResult};
use async_compression::tokio::write::ZlibEncoder;
use axum::http::HeaderMap;
use bytes::Bytes;
use silo_core::attrs::{
    ATTR_CHECKSUM, ATTR_COMPRESSION, ATTR_VERSION, COMPRESSION_ZLIB, FORMAT_VERSION,
    header_for_attr,
};
use silo_core::config::CompressionConfig;
use silo_core::{ATTR_MAP, BLOCK_SIZE, ChunkChecksum, ChunkId, ChunkMetadata};
use silo_storage::{ChunkRepository, ChunkWriter};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

/// Result of a committed upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadOutcome {
    /// MD5 of the bytes received, before any compression.
    pub checksum: ChunkChecksum,
    /// Number of body bytes received.
    pub bytes_in: u64,
}

/// Collect the mapped headers present on a request into chunk metadata.
///
/// Empty and non-UTF-8 values count as absent.
pub fn metadata_from_headers(headers: &HeaderMap) -> ChunkMetadata {
    ATTR_MAP
        .iter()
        .filter_map(|mapping| {
            let value = headers.get(mapping.header)?.to_str().ok()?;
            (!value.is_empty()).then(|| (mapping.attr.to_string(), value.to_string()))
        })
        .collect()
}

/// Store a chunk from a request body.
///
/// `declared_length` of `None` reads the body to its end. Nothing is
/// visible under `id` unless every step succeeds; on failure after the
/// transaction is opened it is aborted before the error is returned.
pub async fn upload_chunk<R>(
    repo: &ChunkRepository,
    id: &ChunkId,
    metadata: ChunkMetadata,
    body: R,
    declared_length: Option<u64>,
    compression: CompressionConfig,
) -> ApiResult<UploadOutcome>
where
    R: AsyncRead + Unpin + Send,
{
    if let Some(attr) = metadata.missing_mandatory() {
        let header = header_for_attr(attr).unwrap_or(attr);
        return Err(ApiError::MissingMandatoryMetadata(header.to_string()));
    }

    let mut writer = repo.put(id.as_str()).await?;
    match transfer(writer.as_mut(), metadata, body, declared_length, compression).await {
        Ok(outcome) => {
            writer.commit().await?;
            debug!(chunk_id = %id, bytes = outcome.bytes_in, "chunk committed");
            Ok(outcome)
        }
        Err(e) => {
            if let Err(abort_err) = writer.abort().await {
                warn!(chunk_id = %id, error = %abort_err, "failed to abort chunk upload");
            }
            Err(e)
        }
    }
}

/// Progress of the body copy.
#[derive(Clone, Copy, Debug)]
enum CopyState {
    /// More bytes are expected; `None` means read to end of stream.
    Reading { remaining: Option<u64> },
    Done,
}

/// Where body blocks go once hashed.
enum BlockSink {
    Plain,
    Zlib(ZlibEncoder<Vec<u8>>),
}

impl BlockSink {
    fn new(compression: CompressionConfig) -> Self {
        match compression {
            CompressionConfig::None => Self::Plain,
            CompressionConfig::Zlib => Self::Zlib(ZlibEncoder::new(Vec::new())),
        }
    }

    async fn push(&mut self, writer: &mut dyn ChunkWriter, block: &[u8]) -> ApiResult<()> {
        match self {
            Self::Plain => writer.write(Bytes::copy_from_slice(block)).await?,
            Self::Zlib(encoder) => {
                encoder.write_all(block).await.map_err(compression_error)?;
                let compressed = std::mem::take(encoder.get_mut());
                if !compressed.is_empty() {
                    writer.write(Bytes::from(compressed)).await?;
                }
            }
        }
        Ok(())
    }

    async fn finish(self, writer: &mut dyn ChunkWriter) -> ApiResult<()> {
        if let Self::Zlib(mut encoder) = self {
            encoder.shutdown().await.map_err(compression_error)?;
            let tail = encoder.into_inner();
            if !tail.is_empty() {
                writer.write(Bytes::from(tail)).await?;
            }
        }
        Ok(())
    }

    fn marker(&self) -> Option<&'static str> {
        match self {
            Self::Plain => None,
            Self::Zlib(_) => Some(COMPRESSION_ZLIB),
        }
    }
}

fn compression_error(e: std::io::Error) -> ApiError {
    ApiError::Internal(format!("compression failed: {e}"))
}

/// Fill `buf` from `body`, stopping early only at end of stream.
async fn read_block<R>(body: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = body.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

async fn transfer<R>(
    writer: &mut dyn ChunkWriter,
    mut metadata: ChunkMetadata,
    mut body: R,
    declared_length: Option<u64>,
    compression: CompressionConfig,
) -> ApiResult<UploadOutcome>
where
    R: AsyncRead + Unpin + Send,
{
    let mut sink = BlockSink::new(compression);
    let mut hasher = ChunkChecksum::hasher();
    let mut buf = vec![0u8; BLOCK_SIZE];
    let mut bytes_in = 0u64;
    let mut state = CopyState::Reading {
        remaining: declared_length,
    };

    while let CopyState::Reading { remaining } = state {
        let want = remaining.map_or(BLOCK_SIZE, |r| r.min(BLOCK_SIZE as u64) as usize);
        if want == 0 {
            state = CopyState::Done;
            continue;
        }

        let n = read_block(&mut body, &mut buf[..want])
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read request body: {e}")))?;
        if n == 0 {
            if let Some(expected) = declared_length {
                return Err(ApiError::IncompleteBody {
                    expected,
                    received: bytes_in,
                });
            }
            state = CopyState::Done;
            continue;
        }

        let block = &buf[..n];
        hasher.update(block);
        sink.push(writer, block).await?;
        bytes_in += n as u64;
        state = CopyState::Reading {
            remaining: remaining.map(|r| r - n as u64),
        };
    }

    let marker = sink.marker();
    sink.finish(writer).await?;

    let checksum = hasher.finalize();
    match metadata.get(ATTR_CHECKSUM) {
        Some(expected) if !checksum.matches_hex(expected) => {
            return Err(ApiError::ChecksumMismatch {
                expected: expected.to_string(),
                actual: checksum.to_hex(),
            });
        }
        Some(_) => {}
        None => {
            metadata.insert(ATTR_CHECKSUM, checksum.to_hex());
        }
    }

    metadata.insert(ATTR_VERSION, FORMAT_VERSION);
    if let Some(marker) = marker {
        metadata.insert(ATTR_COMPRESSION, marker);
    }
    for (key, value) in metadata.iter() {
        writer.set_attr(key, value).await?;
    }

    Ok(UploadOutcome { checksum, bytes_in })
}
