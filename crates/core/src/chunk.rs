//! Chunk identifiers.

use std::fmt;
use std::str::FromStr;

/// Maximum length of a chunk identifier, in characters.
pub const MAX_CHUNK_ID_LEN: usize = 128;

/// Check that every character of `s` is a hexadecimal digit (either case).
///
/// The empty string passes; callers decide whether emptiness is allowed.
pub fn is_hex_string(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// A chunk identifier.
///
/// Identifiers are case-insensitive hexadecimal strings. The canonical form,
/// used as the storage key, is uppercase.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(String);

impl ChunkId {
    /// Parse and canonicalize an identifier.
    pub fn parse(s: &str) -> crate::Result<Self> {
        if s.is_empty() {
            return Err(crate::Error::InvalidChunkId(
                "identifier is empty".to_string(),
            ));
        }
        if s.len() > MAX_CHUNK_ID_LEN {
            return Err(crate::Error::InvalidChunkId(format!(
                "identifier is {} characters long (max {MAX_CHUNK_ID_LEN})",
                s.len()
            )));
        }
        if !is_hex_string(s) {
            return Err(crate::Error::InvalidChunkId(format!(
                "not a hexadecimal string: {s}"
            )));
        }
        Ok(Self(s.to_ascii_uppercase()))
    }

    /// The canonical (uppercase) form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ChunkId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for ChunkId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkId({})", self.0)
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
