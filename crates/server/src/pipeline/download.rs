//! Chunk download: range resolution, metadata headers, streamed body.

use super::range::{ByteRange, ResolvedRange};
use crate::error::{ApiError, ApiResult};
use crate::metrics::StatsSink;
use axum::body::Body;
use axum::http::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use silo_core::attrs::ATTR_COMPRESSION;
use silo_core::{ATTR_MAP, BLOCK_SIZE, ChunkId};
use silo_storage::{ChunkReader, ChunkRepository, StorageResult};
use std::sync::Arc;
use tracing::{debug, error};

/// Reader that never yields more than a fixed number of bytes.
pub struct LimitedReader {
    inner: Box<dyn ChunkReader>,
    remaining: u64,
}

impl LimitedReader {
    pub fn new(inner: Box<dyn ChunkReader>, limit: u64) -> Self {
        Self {
            inner,
            remaining: limit,
        }
    }

    /// Bytes still allowed through.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Read into `buf`, returning 0 once the limit is reached.
    pub async fn read(&mut self, buf: &mut [u8]) -> StorageResult<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let cap = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = self.inner.read(&mut buf[..cap]).await?;
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// An opened chunk, ready to be served.
pub struct ChunkDownload {
    id: ChunkId,
    reader: Box<dyn ChunkReader>,
    range: Option<ResolvedRange>,
    length: u64,
}

impl ChunkDownload {
    /// Open `id` and position it for the optional `Range` header value.
    pub async fn open(
        repo: &ChunkRepository,
        id: &ChunkId,
        range_header: Option<&str>,
    ) -> ApiResult<Self> {
        let mut reader = repo.get(id.as_str()).await?;
        let total = reader.size();

        let range = match range_header {
            Some(header) => Some(ByteRange::parse(header)?.resolve(total)?),
            None => None,
        };

        if let Some(algorithm) = reader.attr(ATTR_COMPRESSION) {
            return Err(ApiError::CompressionNotManaged(algorithm.to_string()));
        }

        if let Some(range) = &range
            && range.start > 0
        {
            reader.seek(range.start).await?;
        }

        let length = range.map_or(total, |r| r.len());
        Ok(Self {
            id: id.clone(),
            reader,
            range,
            length,
        })
    }

    /// Number of body bytes that will be sent.
    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn status(&self) -> StatusCode {
        match (self.range, self.length) {
            (_, 0) => StatusCode::NO_CONTENT,
            (Some(_), _) => StatusCode::PARTIAL_CONTENT,
            (None, _) => StatusCode::OK,
        }
    }

    /// Mapped attributes present on the chunk, in mapping-table order.
    pub fn metadata_headers(&self) -> Vec<(HeaderName, HeaderValue)> {
        ATTR_MAP
            .iter()
            .filter_map(|mapping| {
                let value = self.reader.attr(mapping.attr)?;
                match HeaderValue::from_str(value) {
                    Ok(value) => Some((HeaderName::from_static(mapping.header), value)),
                    Err(e) => {
                        debug!(
                            chunk_id = %self.id,
                            attr = mapping.attr,
                            error = %e,
                            "attribute is not a valid header value, not echoed"
                        );
                        None
                    }
                }
            })
            .collect()
    }

    /// Response headers: length, range and metadata.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from(self.length));
        headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        if let Some(range) = &self.range
            && let Ok(value) = HeaderValue::from_str(&range.content_range())
        {
            headers.insert(CONTENT_RANGE, value);
        }
        for (name, value) in self.metadata_headers() {
            headers.insert(name, value);
        }
        headers
    }

    /// Turn the download into a response streaming the body in blocks.
    ///
    /// Bytes are counted into `stats` as they are produced. A read failure
    /// after the headers are out is logged and ends the body with an error.
    pub fn into_response(self, stats: Arc<dyn StatsSink>) -> Response {
        let status = self.status();
        let headers = self.headers();
        let id = self.id;
        let mut reader = LimitedReader::new(self.reader, self.length);

        let stream = async_stream::stream! {
            let mut buf = vec![0u8; BLOCK_SIZE];
            while reader.remaining() > 0 {
                match reader.read(&mut buf).await {
                    Ok(0) => {
                        error!(chunk_id = %id, missing = reader.remaining(), "chunk ended before its declared size");
                        yield Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof));
                        break;
                    }
                    Ok(n) => {
                        stats.add_bytes_out(n as u64);
                        yield Ok(Bytes::copy_from_slice(&buf[..n]));
                    }
                    Err(e) => {
                        error!(chunk_id = %id, error = %e, "chunk streaming failed mid-transfer");
                        yield Err(std::io::Error::other(e.to_string()));
                        break;
                    }
                }
            }
        };

        (status, headers, Body::from_stream(stream)).into_response()
    }
}
