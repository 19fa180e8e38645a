use async_trait::async_trait;
use silo_storage::error::{StorageError, StorageResult};
use silo_storage::traits::{Backend, ChunkReader, ChunkWriter, ListSlice};
use silo_storage::MemoryBackend;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Memory backend that counts how often each operation reaches it.
#[allow(dead_code)]
#[derive(Default)]
pub struct InstrumentedBackend {
    pub inner: MemoryBackend,
    pub list_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
}

#[allow(dead_code)]
impl InstrumentedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for InstrumentedBackend {
    async fn lock(&self, namespace: &str, url: &str) -> StorageResult<()> {
        self.inner.lock(namespace, url).await
    }

    async fn has(&self, name: &str) -> StorageResult<bool> {
        self.inner.has(name).await
    }

    async fn del(&self, name: &str) -> StorageResult<()> {
        self.inner.del(name).await
    }

    async fn get(&self, name: &str) -> StorageResult<Box<dyn ChunkReader>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get(name).await
    }

    async fn put(&self, name: &str) -> StorageResult<Box<dyn ChunkWriter>> {
        self.inner.put(name).await
    }

    async fn link(&self, from: &str, to: &str) -> StorageResult<Box<dyn ChunkWriter>> {
        self.inner.link(from, to).await
    }

    async fn list(&self, marker: &str, prefix: &str, max: usize) -> StorageResult<ListSlice> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list(marker, prefix, max).await
    }

    fn backend_name(&self) -> &'static str {
        "instrumented"
    }
}

/// Backend whose every operation fails with the configured I/O error kind.
#[allow(dead_code)]
pub struct FailingBackend {
    pub kind: std::io::ErrorKind,
}

#[allow(dead_code)]
impl FailingBackend {
    pub fn new(kind: std::io::ErrorKind) -> Arc<Self> {
        Arc::new(Self { kind })
    }

    fn fail<T>(&self) -> StorageResult<T> {
        Err(StorageError::Io(std::io::Error::new(
            self.kind,
            "injected failure",
        )))
    }
}

#[async_trait]
impl Backend for FailingBackend {
    async fn lock(&self, _namespace: &str, _url: &str) -> StorageResult<()> {
        self.fail()
    }

    async fn has(&self, _name: &str) -> StorageResult<bool> {
        self.fail()
    }

    async fn del(&self, _name: &str) -> StorageResult<()> {
        self.fail()
    }

    async fn get(&self, _name: &str) -> StorageResult<Box<dyn ChunkReader>> {
        self.fail()
    }

    async fn put(&self, _name: &str) -> StorageResult<Box<dyn ChunkWriter>> {
        self.fail()
    }

    async fn link(&self, _from: &str, _to: &str) -> StorageResult<Box<dyn ChunkWriter>> {
        self.fail()
    }

    async fn list(&self, _marker: &str, _prefix: &str, _max: usize) -> StorageResult<ListSlice> {
        self.fail()
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}
