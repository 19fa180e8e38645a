//! Test doubles for statistics and storage.

use async_trait::async_trait;
use bytes::Bytes;
use silo_server::StatsSink;
use silo_storage::{
    Backend, ChunkReader, ChunkWriter, ListSlice, MemoryBackend, StorageError, StorageResult,
};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Stats sink that keeps everything it is told.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingStats {
    pub requests: Mutex<Vec<(&'static str, u16)>>,
    pub bytes_in: AtomicU64,
    pub bytes_out: AtomicU64,
    pub checksum_mismatches: AtomicU64,
}

#[allow(dead_code)]
impl RecordingStats {
    pub fn requests(&self) -> Vec<(&'static str, u16)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn bytes_in(&self) -> u64 {
        self.bytes_in.load(Ordering::SeqCst)
    }

    pub fn bytes_out(&self) -> u64 {
        self.bytes_out.load(Ordering::SeqCst)
    }

    pub fn checksum_mismatches(&self) -> u64 {
        self.checksum_mismatches.load(Ordering::SeqCst)
    }
}

impl StatsSink for RecordingStats {
    fn record_request(&self, verb: &'static str, status: u16, _elapsed: Duration) {
        self.requests.lock().unwrap().push((verb, status));
    }

    fn add_bytes_in(&self, bytes: u64) {
        self.bytes_in.fetch_add(bytes, Ordering::SeqCst);
    }

    fn add_bytes_out(&self, bytes: u64) {
        self.bytes_out.fetch_add(bytes, Ordering::SeqCst);
    }

    fn record_checksum_mismatch(&self) {
        self.checksum_mismatches.fetch_add(1, Ordering::SeqCst);
    }
}

fn injected() -> StorageError {
    StorageError::Io(std::io::Error::other("injected failure"))
}

/// Memory backend with switchable faults.
#[allow(dead_code)]
#[derive(Default)]
pub struct FaultyBackend {
    pub inner: MemoryBackend,
    /// Make `set_attr` fail on every write transaction.
    pub fail_set_attr: bool,
    /// Make `read` fail on every read handle.
    pub fail_reads: bool,
    /// Make `del` fail with a non-not-found error.
    pub fail_deletes: bool,
    pub aborts: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl FaultyBackend {
    pub fn aborts(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for FaultyBackend {
    async fn lock(&self, namespace: &str, url: &str) -> StorageResult<()> {
        self.inner.lock(namespace, url).await
    }

    async fn has(&self, name: &str) -> StorageResult<bool> {
        self.inner.has(name).await
    }

    async fn del(&self, name: &str) -> StorageResult<()> {
        if self.fail_deletes {
            return Err(injected());
        }
        self.inner.del(name).await
    }

    async fn get(&self, name: &str) -> StorageResult<Box<dyn ChunkReader>> {
        let inner = self.inner.get(name).await?;
        Ok(Box::new(FaultyReader {
            inner,
            fail_reads: self.fail_reads,
        }))
    }

    async fn put(&self, name: &str) -> StorageResult<Box<dyn ChunkWriter>> {
        let inner = self.inner.put(name).await?;
        Ok(Box::new(FaultyWriter {
            inner,
            fail_set_attr: self.fail_set_attr,
            aborts: self.aborts.clone(),
        }))
    }

    async fn link(&self, from: &str, to: &str) -> StorageResult<Box<dyn ChunkWriter>> {
        self.inner.link(from, to).await
    }

    async fn list(&self, marker: &str, prefix: &str, max: usize) -> StorageResult<ListSlice> {
        self.inner.list(marker, prefix, max).await
    }

    fn backend_name(&self) -> &'static str {
        "faulty"
    }
}

struct FaultyReader {
    inner: Box<dyn ChunkReader>,
    fail_reads: bool,
}

#[async_trait]
impl ChunkReader for FaultyReader {
    fn size(&self) -> u64 {
        self.inner.size()
    }

    async fn read(&mut self, buf: &mut [u8]) -> StorageResult<usize> {
        if self.fail_reads {
            return Err(injected());
        }
        self.inner.read(buf).await
    }

    async fn seek(&mut self, offset: u64) -> StorageResult<()> {
        self.inner.seek(offset).await
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.inner.attr(key)
    }
}

struct FaultyWriter {
    inner: Box<dyn ChunkWriter>,
    fail_set_attr: bool,
    aborts: Arc<AtomicUsize>,
}

#[async_trait]
impl ChunkWriter for FaultyWriter {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        self.inner.write(data).await
    }

    async fn set_attr(&mut self, key: &str, value: &str) -> StorageResult<()> {
        if self.fail_set_attr {
            return Err(injected());
        }
        self.inner.set_attr(key, value).await
    }

    async fn commit(self: Box<Self>) -> StorageResult<u64> {
        self.inner.commit().await
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        self.aborts.fetch_add(1, Ordering::SeqCst);
        self.inner.abort().await
    }
}
