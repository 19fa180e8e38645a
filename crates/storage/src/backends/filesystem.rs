//! Local filesystem storage backend.
//!
//! Each object is one regular file under a fan-out directory tree derived
//! from its name. Attributes live in the file's extended attributes, so
//! they travel with the inode: a link shares them with its source.

use crate::error::{StorageError, StorageResult};
use crate::traits::{Backend, ChunkReader, ChunkWriter, ListSlice};
use async_trait::async_trait;
use bytes::Bytes;
use silo_core::ChunkMetadata;
use silo_core::attrs::ATTR_PREFIX;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, instrument, warn};
use uuid::Uuid;
use xattr::FileExt;

/// Root-directory attribute holding the namespace the volume serves.
const ATTR_VOLUME_NAMESPACE: &str = "user.silo.volume.namespace";
/// Root-directory attribute holding the URL of the service owning the volume.
const ATTR_VOLUME_URL: &str = "user.silo.volume.url";

/// Fills fan-out levels of names shorter than `hash_width * hash_depth`.
const FAN_OUT_PAD: char = '_';

/// Local filesystem object store.
pub struct FilesystemBackend {
    root: PathBuf,
    hash_width: usize,
    hash_depth: usize,
}

impl FilesystemBackend {
    /// Create a new filesystem backend rooted at `root`.
    ///
    /// Object names are fanned out over `hash_depth` directory levels of
    /// `hash_width` characters each.
    pub async fn new(
        root: impl AsRef<Path>,
        hash_width: usize,
        hash_depth: usize,
    ) -> StorageResult<Self> {
        if hash_width == 0 && hash_depth > 0 {
            return Err(StorageError::Config(
                "hash_width must be positive when hash_depth is set".to_string(),
            ));
        }
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            hash_width,
            hash_depth,
        })
    }

    /// Root directory of the volume.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the full path for an object name.
    ///
    /// Names are restricted to `[A-Za-z0-9_-]`, so no name can traverse
    /// out of the root or collide with a temporary file. Every object sits
    /// exactly `hash_depth` levels down; levels the name cannot fill are
    /// padded, so an object file never occupies a fan-out directory path.
    fn object_path(&self, name: &str) -> StorageResult<PathBuf> {
        if name.is_empty()
            || !name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err(StorageError::InvalidKey(format!(
                "object names must be non-empty [A-Za-z0-9_-]: {name:?}"
            )));
        }

        let mut path = self.root.clone();
        let mut rest = name;
        for _ in 0..self.hash_depth {
            let (level, tail) = rest.split_at(rest.len().min(self.hash_width));
            let mut level = level.to_string();
            while level.len() < self.hash_width {
                level.push(FAN_OUT_PAD);
            }
            path.push(level);
            rest = tail;
        }
        path.push(name);
        Ok(path)
    }

    /// Ensure parent directory exists.
    async fn ensure_parent(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

/// Whether `path` holds a published object (a regular file).
async fn object_exists(path: &Path) -> StorageResult<bool> {
    match fs::metadata(path).await {
        Ok(metadata) => Ok(metadata.is_file()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StorageError::Io(e)),
    }
}

fn link_error(name: String, e: std::io::Error) -> StorageError {
    if e.kind() == std::io::ErrorKind::AlreadyExists {
        StorageError::AlreadyExists(name)
    } else {
        StorageError::Io(e)
    }
}

/// Run blocking filesystem work (xattrs, links) off the async runtime.
async fn blocking<F, T>(f: F) -> StorageResult<T>
where
    F: FnOnce() -> StorageResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        StorageError::Io(std::io::Error::other(format!("spawn_blocking failed: {e}")))
    })?
}

fn not_found_as(name: &str) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(name.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

fn read_xattr_string(path: &Path, key: &str) -> StorageResult<Option<String>> {
    Ok(xattr::get(path, key)?.map(|raw| String::from_utf8_lossy(&raw).into_owned()))
}

/// Load every chunk attribute stored on an open file.
fn load_attrs(file: &std::fs::File) -> StorageResult<ChunkMetadata> {
    let mut attrs = ChunkMetadata::new();
    for key in file.list_xattr()? {
        let Some(key) = key.to_str() else { continue };
        if !key.starts_with(ATTR_PREFIX) {
            continue;
        }
        if let Some(value) = file.get_xattr(key)? {
            attrs.insert(key, String::from_utf8_lossy(&value).into_owned());
        }
    }
    Ok(attrs)
}

#[async_trait]
impl Backend for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn lock(&self, namespace: &str, url: &str) -> StorageResult<()> {
        let root = self.root.clone();
        let namespace = namespace.to_string();
        let url = url.to_string();
        blocking(move || {
            let current_ns = read_xattr_string(&root, ATTR_VOLUME_NAMESPACE)?;
            let current_url = read_xattr_string(&root, ATTR_VOLUME_URL)?;
            match (current_ns, current_url) {
                (None, None) => {
                    xattr::set(&root, ATTR_VOLUME_NAMESPACE, namespace.as_bytes())?;
                    xattr::set(&root, ATTR_VOLUME_URL, url.as_bytes())?;
                    debug!(%namespace, %url, "volume locked");
                    Ok(())
                }
                (Some(ns), Some(u)) if ns == namespace && u == url => Ok(()),
                (ns, u) => Err(StorageError::Locked {
                    namespace: ns.unwrap_or_default(),
                    url: u.unwrap_or_default(),
                }),
            }
        })
        .await
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn has(&self, name: &str) -> StorageResult<bool> {
        let path = self.object_path(name)?;
        object_exists(&path).await
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn del(&self, name: &str) -> StorageResult<()> {
        let path = self.object_path(name)?;
        fs::remove_file(&path).await.map_err(not_found_as(name))?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get(&self, name: &str) -> StorageResult<Box<dyn ChunkReader>> {
        let path = self.object_path(name)?;
        let key = name.to_string();
        let (file, size, attrs) = blocking(move || {
            let file = std::fs::File::open(&path).map_err(not_found_as(&key))?;
            let metadata = file.metadata()?;
            if !metadata.is_file() {
                return Err(StorageError::NotFound(key));
            }
            let size = metadata.len();
            let attrs = load_attrs(&file)?;
            Ok((file, size, attrs))
        })
        .await?;

        Ok(Box::new(FilesystemReader {
            file: fs::File::from_std(file),
            size,
            attrs,
        }))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn put(&self, name: &str) -> StorageResult<Box<dyn ChunkWriter>> {
        let path = self.object_path(name)?;
        if object_exists(&path).await? {
            return Err(StorageError::AlreadyExists(name.to_string()));
        }
        self.ensure_parent(&path).await?;

        // Unique temp name so concurrent uploads of one name never share a file
        let temp_path = path.with_file_name(format!("{name}.tmp.{}", Uuid::new_v4()));
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await?;

        Ok(Box::new(FilesystemWriter {
            name: name.to_string(),
            file: Some(file),
            temp_path,
            final_path: path,
            bytes_written: 0,
            resolved: false,
        }))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn link(&self, from: &str, to: &str) -> StorageResult<Box<dyn ChunkWriter>> {
        let source = self.object_path(from)?;
        let target = self.object_path(to)?;
        if !object_exists(&source).await? {
            return Err(StorageError::NotFound(from.to_string()));
        }
        if object_exists(&target).await? {
            return Err(StorageError::AlreadyExists(to.to_string()));
        }
        self.ensure_parent(&target).await?;

        Ok(Box::new(FilesystemLink {
            name: to.to_string(),
            source,
            target,
            pending: Vec::new(),
        }))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn list(&self, marker: &str, prefix: &str, max: usize) -> StorageResult<ListSlice> {
        let mut names = Vec::new();
        let mut stack = vec![self.root.clone()];
        while let Some(dir) = stack.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                // file_type() does not follow symlinks; those are ignored
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    stack.push(entry.path());
                } else if file_type.is_file()
                    && let Some(file_name) = entry.file_name().to_str()
                    && !file_name.contains('.')
                {
                    names.push(file_name.to_string());
                }
            }
        }
        Ok(ListSlice::select(names, marker, prefix, max))
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("storage root not accessible: {e}"),
            ))
        })?;

        if !metadata.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotADirectory,
                format!("storage root is not a directory: {:?}", self.root),
            )));
        }

        Ok(())
    }
}

/// Read handle on a stored file.
struct FilesystemReader {
    file: fs::File,
    size: u64,
    attrs: ChunkMetadata,
}

#[async_trait]
impl ChunkReader for FilesystemReader {
    fn size(&self) -> u64 {
        self.size
    }

    async fn read(&mut self, buf: &mut [u8]) -> StorageResult<usize> {
        Ok(self.file.read(buf).await?)
    }

    async fn seek(&mut self, offset: u64) -> StorageResult<()> {
        self.file.seek(std::io::SeekFrom::Start(offset)).await?;
        Ok(())
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key)
    }
}

/// Upload transaction: a temp file published by hard link on commit.
struct FilesystemWriter {
    name: String,
    file: Option<fs::File>,
    temp_path: PathBuf,
    final_path: PathBuf,
    bytes_written: u64,
    resolved: bool,
}

impl FilesystemWriter {
    fn file(&mut self) -> StorageResult<&mut fs::File> {
        self.file.as_mut().ok_or_else(|| {
            StorageError::Io(std::io::Error::other("upload file already closed"))
        })
    }
}

#[async_trait]
impl ChunkWriter for FilesystemWriter {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        self.file()?.write_all(&data).await?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    async fn set_attr(&mut self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.temp_path.clone();
        let key = key.to_string();
        let value = value.to_string();
        blocking(move || Ok(xattr::set(&path, key, value.as_bytes())?)).await
    }

    async fn commit(mut self: Box<Self>) -> StorageResult<u64> {
        // Ensure all data is on disk before the name becomes visible
        let file = self.file()?;
        file.flush().await?;
        file.sync_all().await?;
        self.file = None;

        let temp = self.temp_path.clone();
        let target = self.final_path.clone();
        let name = self.name.clone();
        let published = blocking(move || {
            // hard_link fails if the target exists, unlike rename
            std::fs::hard_link(&temp, &target).map_err(|e| link_error(name, e))
        })
        .await;

        // Drop removes the temp file on both outcomes
        published?;
        self.resolved = true;
        if let Err(e) = fs::remove_file(&self.temp_path).await {
            warn!(path = ?self.temp_path, error = %e, "failed to remove upload temp file");
        }
        Ok(self.bytes_written)
    }

    async fn abort(mut self: Box<Self>) -> StorageResult<()> {
        self.file = None;
        self.resolved = true;
        match fs::remove_file(&self.temp_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

impl Drop for FilesystemWriter {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        self.file = None;
        if let Err(e) = std::fs::remove_file(&self.temp_path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = ?self.temp_path, error = %e, "failed to discard upload temp file");
        }
    }
}

/// Link transaction: publishes an existing inode under a second name.
struct FilesystemLink {
    name: String,
    source: PathBuf,
    target: PathBuf,
    pending: Vec<(String, String)>,
}

#[async_trait]
impl ChunkWriter for FilesystemLink {
    async fn write(&mut self, _data: Bytes) -> StorageResult<()> {
        Err(StorageError::Unsupported(
            "link transactions do not accept data".to_string(),
        ))
    }

    async fn set_attr(&mut self, key: &str, value: &str) -> StorageResult<()> {
        self.pending.push((key.to_string(), value.to_string()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StorageResult<u64> {
        let FilesystemLink {
            name,
            source,
            target,
            pending,
        } = *self;
        blocking(move || {
            // Stage a private name, attach attributes, then publish it
            let staged = target.with_file_name(format!("{name}.tmp.{}", Uuid::new_v4()));
            std::fs::hard_link(&source, &staged).map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    StorageError::NotFound(source.display().to_string())
                }
                _ => StorageError::Io(e),
            })?;

            let result = apply_link_attrs(&staged, &pending).and_then(|()| {
                std::fs::hard_link(&staged, &target).map_err(|e| link_error(name, e))
            });
            if let Err(e) = std::fs::remove_file(&staged) {
                warn!(path = ?staged, error = %e, "failed to remove staged link");
            }
            result.map(|()| 0)
        })
        .await
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        Ok(())
    }
}

/// Set `pending` on the staged link.
///
/// The inode is shared with the source, so on failure every attribute
/// already written is put back to its previous value.
fn apply_link_attrs(staged: &Path, pending: &[(String, String)]) -> StorageResult<()> {
    let mut previous: Vec<(&str, Option<Vec<u8>>)> = Vec::with_capacity(pending.len());
    for (key, value) in pending {
        let result = xattr::get(staged, key).and_then(|old| {
            xattr::set(staged, key, value.as_bytes())?;
            Ok(old)
        });
        match result {
            Ok(old) => previous.push((key.as_str(), old)),
            Err(e) => {
                for (key, old) in previous.into_iter().rev() {
                    let restored = match old {
                        Some(old) => xattr::set(staged, key, &old),
                        None => xattr::remove(staged, key),
                    };
                    if let Err(restore_err) = restored {
                        warn!(key, error = %restore_err, "failed to restore attribute after link failure");
                    }
                }
                return Err(StorageError::Io(e));
            }
        }
    }
    Ok(())
}
