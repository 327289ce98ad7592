//! Key-value backends

use std::{
    collections::HashMap,
    fmt::Debug,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::{fs, task};
use tracing::debug;

use crate::error::StorageError;

/// String-keyed storage of string values.
///
/// Every write replaces the whole value under a key. There is no versioning:
/// the last writer wins.
#[async_trait]
pub trait KeyValueStore: Send + Sync + Debug {
    /// Read the value under `key`, `None` when nothing was ever written
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value under `key`
    async fn set_item(&self, key: &str, value: String) -> Result<(), StorageError>;
}

/// In-process store, lost when dropped
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.items.lock().map_err(|e| {
            StorageError::Io(std::io::Error::other(format!(
                "Failed to lock memory store: {}",
                e
            )))
        })
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }
}

/// Directory-backed store, one `<key>.json` file per key
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the value for `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No stored value at {}", path.display());
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(key);
        let dir = self.dir.clone();
        let target = path.clone();
        task::spawn_blocking(move || write_replacing(&dir, &target, value.as_bytes()))
            .await
            .map_err(std::io::Error::other)??;

        debug!("Stored {} at {}", key, path.display());
        Ok(())
    }
}

/// Write `contents` to a staging file of its own in `dir`, then rename it
/// over `path`. Readers never see a torn file and concurrent writers each
/// land whole, the last rename winning.
fn write_replacing(dir: &Path, path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut staging = NamedTempFile::new_in(dir)?;
    staging.write_all(contents)?;
    staging.as_file().sync_all()?;
    staging.persist(path).map_err(|e| e.error)?;
    Ok(())
}
