//! Chunk checksums.
//!
//! A chunk checksum is the MD5 digest of the chunk's uncompressed bytes. Its
//! canonical text form is uppercase hexadecimal; parsing and comparison are
//! case-insensitive.

use md5::{Digest, Md5};
use std::fmt;

/// An MD5 chunk checksum represented as 16 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkChecksum([u8; 16]);

impl ChunkChecksum {
    /// Create a new checksum from raw bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Compute the checksum of data.
    pub fn compute(data: &[u8]) -> Self {
        Self(Md5::digest(data).into())
    }

    /// Create an incremental hasher.
    pub fn hasher() -> ChecksumHasher {
        ChecksumHasher(Md5::new())
    }

    /// Parse from a hex string of either case.
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        if s.len() != 32 {
            return Err(crate::Error::InvalidChecksum(format!(
                "expected 32 hex chars, got {}",
                s.len()
            )));
        }
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| crate::Error::InvalidChecksum(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Encode as uppercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    /// Compare against a caller-supplied hex string, ignoring case.
    pub fn matches_hex(&self, s: &str) -> bool {
        s.eq_ignore_ascii_case(&self.to_hex())
    }
}

impl fmt::Debug for ChunkChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkChecksum({})", self.to_hex())
    }
}

impl fmt::Display for ChunkChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Incremental MD5 hasher.
pub struct ChecksumHasher(Md5);

impl ChecksumHasher {
    /// Update the hasher with data.
    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    /// Finalize and return the checksum.
    pub fn finalize(self) -> ChunkChecksum {
        ChunkChecksum(self.0.finalize().into())
    }
}

impl Default for ChecksumHasher {
    fn default() -> Self {
        ChunkChecksum::hasher()
    }
}
