//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;

/// A read handle on one stored object.
///
/// The handle is released when dropped.
#[async_trait]
pub trait ChunkReader: Send {
    /// Total size of the object in bytes.
    fn size(&self) -> u64;

    /// Read the next bytes into `buf`, returning how many were read.
    ///
    /// Returns 0 at end of object.
    async fn read(&mut self, buf: &mut [u8]) -> StorageResult<usize>;

    /// Move the read position to `offset` bytes from the start.
    async fn seek(&mut self, offset: u64) -> StorageResult<()>;

    /// Look up one attribute of the object.
    fn attr(&self, key: &str) -> Option<&str>;
}

/// A write transaction on one object name.
///
/// Nothing written through the transaction is visible before [`commit`].
/// Both terminal operations consume the handle; implementations discard
/// their writes when dropped unresolved.
///
/// [`commit`]: ChunkWriter::commit
#[async_trait]
pub trait ChunkWriter: Send {
    /// Append bytes to the object.
    async fn write(&mut self, data: Bytes) -> StorageResult<()>;

    /// Set one attribute on the object.
    async fn set_attr(&mut self, key: &str, value: &str) -> StorageResult<()>;

    /// Make the object visible with all its attributes.
    ///
    /// Returns the number of bytes written through this transaction.
    async fn commit(self: Box<Self>) -> StorageResult<u64>;

    /// Discard everything written through this transaction.
    async fn abort(self: Box<Self>) -> StorageResult<()>;
}

/// One page of a listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListSlice {
    /// Object names, sorted ascending.
    pub names: Vec<String>,
    /// Whether more names matched than were returned.
    pub truncated: bool,
}

impl ListSlice {
    /// Build a page from unordered candidate names.
    ///
    /// Keeps the names that start with `prefix` and sort at or after
    /// `marker`, both compared case-insensitively, then returns at most
    /// `max` of them in order.
    pub fn select<I>(names: I, marker: &str, prefix: &str, max: usize) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let marker = marker.to_ascii_uppercase();
        let prefix = prefix.to_ascii_uppercase();
        let mut matching: Vec<String> = names
            .into_iter()
            .filter(|name| {
                let upper = name.to_ascii_uppercase();
                upper.starts_with(&prefix) && upper >= marker
            })
            .collect();
        matching.sort_unstable_by_key(|name| name.to_ascii_uppercase());

        let truncated = matching.len() > max;
        matching.truncate(max);
        Self {
            names: matching,
            truncated,
        }
    }
}

/// Byte-storage backend: named objects with attributes.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Bind the volume to a namespace and service URL.
    ///
    /// Fails if the volume is already bound to a different pair.
    async fn lock(&self, namespace: &str, url: &str) -> StorageResult<()>;

    /// Check if an object exists.
    async fn has(&self, name: &str) -> StorageResult<bool>;

    /// Delete an object.
    async fn del(&self, name: &str) -> StorageResult<()>;

    /// Open an existing object for reading.
    async fn get(&self, name: &str) -> StorageResult<Box<dyn ChunkReader>>;

    /// Start a write transaction for a new object.
    ///
    /// Fails with `AlreadyExists` if the name is taken.
    async fn put(&self, name: &str) -> StorageResult<Box<dyn ChunkWriter>>;

    /// Start a transaction that publishes the bytes of `from` under `to`.
    ///
    /// The transaction accepts attributes but no bytes.
    async fn link(&self, from: &str, to: &str) -> StorageResult<Box<dyn ChunkWriter>>;

    /// List object names (see [`ListSlice::select`] for the matching rules).
    async fn list(&self, marker: &str, prefix: &str, max: usize) -> StorageResult<ListSlice>;

    /// Static identifier of the backend type, for logs.
    fn backend_name(&self) -> &'static str;

    /// Verify the backend is usable. Called once at startup.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}
