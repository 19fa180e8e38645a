//! `Range` header handling for chunk downloads.

use crate::error::{ApiError, ApiResult};

/// A requested byte range, `bytes=<start>-<end>` with `end` inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Parse a `Range` header value.
    ///
    /// Only a single closed range is accepted, and it must span at least
    /// two bytes (`end > start`).
    pub fn parse(header: &str) -> ApiResult<Self> {
        let invalid = || ApiError::InvalidRange(header.to_string());

        let spec = header.trim().strip_prefix("bytes=").ok_or_else(invalid)?;
        let (start, end) = spec.split_once('-').ok_or_else(invalid)?;
        let start: u64 = start.trim().parse().map_err(|_| invalid())?;
        let end: u64 = end.trim().parse().map_err(|_| invalid())?;
        if end <= start {
            return Err(invalid());
        }
        Ok(Self { start, end })
    }

    /// Resolve against a chunk of `total` bytes.
    ///
    /// The end is clamped to the last byte of the chunk; a start at or past
    /// the end of the chunk cannot be served.
    pub fn resolve(self, total: u64) -> ApiResult<ResolvedRange> {
        if self.start >= total {
            return Err(ApiError::RangeNotSatisfiable {
                start: self.start,
                size: total,
            });
        }
        Ok(ResolvedRange {
            start: self.start,
            last: self.end.min(total - 1),
            total,
        })
    }
}

/// A range that fits inside a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedRange {
    /// First byte served.
    pub start: u64,
    /// Last byte served, inclusive.
    pub last: u64,
    /// Size of the whole chunk.
    pub total: u64,
}

impl ResolvedRange {
    /// Number of bytes served.
    pub fn len(&self) -> u64 {
        self.last - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.last < self.start
    }

    /// Value of the `Content-Range` response header.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.last, self.total)
    }
}
