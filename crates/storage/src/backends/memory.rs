//! In-memory storage backend.
//!
//! Objects live in a shared map and vanish with the process. Useful for
//! tests and for running a node without a volume.

use crate::error::{StorageError, StorageResult};
use crate::traits::{Backend, ChunkReader, ChunkWriter, ListSlice};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use silo_core::ChunkMetadata;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::instrument;

type ObjectMap = Arc<RwLock<BTreeMap<String, Arc<MemoryObject>>>>;

/// One stored object. Links share the same `Arc`, hence the same attributes.
#[derive(Debug)]
struct MemoryObject {
    data: Bytes,
    attrs: RwLock<ChunkMetadata>,
}

/// In-memory object store.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    objects: ObjectMap,
    volume: Arc<Mutex<Option<(String, String)>>>,
}

impl MemoryBackend {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StorageError {
    StorageError::Io(std::io::Error::other("memory backend lock poisoned"))
}

#[async_trait]
impl Backend for MemoryBackend {
    #[instrument(skip(self), fields(backend = "memory"))]
    async fn lock(&self, namespace: &str, url: &str) -> StorageResult<()> {
        let mut volume = self.volume.lock().map_err(|_| poisoned())?;
        match volume.as_ref() {
            None => {
                *volume = Some((namespace.to_string(), url.to_string()));
                Ok(())
            }
            Some((ns, u)) if ns == namespace && u == url => Ok(()),
            Some((ns, u)) => Err(StorageError::Locked {
                namespace: ns.clone(),
                url: u.clone(),
            }),
        }
    }

    async fn has(&self, name: &str) -> StorageResult<bool> {
        Ok(self.objects.read().map_err(|_| poisoned())?.contains_key(name))
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn del(&self, name: &str) -> StorageResult<()> {
        match self.objects.write().map_err(|_| poisoned())?.remove(name) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(name.to_string())),
        }
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn get(&self, name: &str) -> StorageResult<Box<dyn ChunkReader>> {
        let object = self
            .objects
            .read()
            .map_err(|_| poisoned())?
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;
        // Snapshot attributes so the reader never holds the object lock
        let attrs = object.attrs.read().map_err(|_| poisoned())?.clone();
        Ok(Box::new(MemoryReader {
            data: object.data.clone(),
            position: 0,
            attrs,
        }))
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn put(&self, name: &str) -> StorageResult<Box<dyn ChunkWriter>> {
        if self.objects.read().map_err(|_| poisoned())?.contains_key(name) {
            return Err(StorageError::AlreadyExists(name.to_string()));
        }
        Ok(Box::new(MemoryWriter {
            objects: self.objects.clone(),
            name: name.to_string(),
            source: None,
            data: BytesMut::new(),
            attrs: ChunkMetadata::new(),
        }))
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn link(&self, from: &str, to: &str) -> StorageResult<Box<dyn ChunkWriter>> {
        let objects = self.objects.read().map_err(|_| poisoned())?;
        if !objects.contains_key(from) {
            return Err(StorageError::NotFound(from.to_string()));
        }
        if objects.contains_key(to) {
            return Err(StorageError::AlreadyExists(to.to_string()));
        }
        Ok(Box::new(MemoryWriter {
            objects: self.objects.clone(),
            name: to.to_string(),
            source: Some(from.to_string()),
            data: BytesMut::new(),
            attrs: ChunkMetadata::new(),
        }))
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn list(&self, marker: &str, prefix: &str, max: usize) -> StorageResult<ListSlice> {
        let names: Vec<String> = self
            .objects
            .read()
            .map_err(|_| poisoned())?
            .keys()
            .cloned()
            .collect();
        Ok(ListSlice::select(names, marker, prefix, max))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryReader {
    data: Bytes,
    position: usize,
    attrs: ChunkMetadata,
}

#[async_trait]
impl ChunkReader for MemoryReader {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    async fn read(&mut self, buf: &mut [u8]) -> StorageResult<usize> {
        let remaining = &self.data[self.position.min(self.data.len())..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        Ok(n)
    }

    async fn seek(&mut self, offset: u64) -> StorageResult<()> {
        self.position = usize::try_from(offset).unwrap_or(usize::MAX);
        Ok(())
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key)
    }
}

/// Buffered transaction. Nothing touches the map until commit.
struct MemoryWriter {
    objects: ObjectMap,
    name: String,
    /// Set for link transactions.
    source: Option<String>,
    data: BytesMut,
    attrs: ChunkMetadata,
}

#[async_trait]
impl ChunkWriter for MemoryWriter {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        if self.source.is_some() {
            return Err(StorageError::Unsupported(
                "link transactions do not accept data".to_string(),
            ));
        }
        self.data.extend_from_slice(&data);
        Ok(())
    }

    async fn set_attr(&mut self, key: &str, value: &str) -> StorageResult<()> {
        self.attrs.insert(key, value);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StorageResult<u64> {
        let MemoryWriter {
            objects,
            name,
            source,
            data,
            attrs,
        } = *self;

        let mut objects = objects.write().map_err(|_| poisoned())?;
        if objects.contains_key(&name) {
            return Err(StorageError::AlreadyExists(name));
        }

        match source {
            None => {
                let written = data.len() as u64;
                objects.insert(
                    name,
                    Arc::new(MemoryObject {
                        data: data.freeze(),
                        attrs: RwLock::new(attrs),
                    }),
                );
                Ok(written)
            }
            Some(source) => {
                let object = objects
                    .get(&source)
                    .cloned()
                    .ok_or(StorageError::NotFound(source))?;
                {
                    let mut shared = object.attrs.write().map_err(|_| poisoned())?;
                    for (key, value) in attrs.iter() {
                        shared.insert(key, value);
                    }
                }
                objects.insert(name, object);
                Ok(0)
            }
        }
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        Ok(())
    }
}
