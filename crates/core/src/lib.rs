//! Core domain types for the silo chunk node.
//!
//! This crate defines the data model shared by the storage and server crates:
//! - Chunk identifiers and their hexadecimal alphabet
//! - Chunk checksums (MD5, rendered as uppercase hex)
//! - The attribute/header mapping table and chunk metadata
//! - Configuration

pub mod attrs;
pub mod checksum;
pub mod chunk;
pub mod config;
pub mod error;

pub use attrs::{ATTR_MAP, AttrMapping, ChunkMetadata, MANDATORY_ATTRS};
pub use checksum::{ChecksumHasher, ChunkChecksum};
pub use chunk::{ChunkId, is_hex_string};
pub use error::{Error, Result};

/// Block size used to stream chunk bodies in and out: 1 MiB.
pub const BLOCK_SIZE: usize = 1024 * 1024;
