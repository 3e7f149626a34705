use std::{
    collections::HashMap,
    io::ErrorKind,
    ops::Deref,
    path::{Path, PathBuf},
};

use anyhow::{Result, bail};
use async_trait::async_trait;
use fs4::tokio::AsyncFileExt;
use serde_json::Value;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
    sync::Mutex,
};
use tracing::{debug, warn};

/// Interface for abstracting persistence. Values are structured JSON, absent keys are [None].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;
}

#[async_trait]
impl<T> KeyValueStorage for T
where
    T: Deref + Send + Sync,
    T::Target: KeyValueStorage,
{
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.deref().get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.deref().set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.deref().remove(key).await
    }
}

/// Stores every key as its own `<key>.json` file inside a directory. Reads take a shared lock
/// and writes an exclusive one, so a second process never sees half a ledger.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&dir)?;

        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            bail!("Storage key {key:?} contains unsupported characters");
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    async fn read(path: &Path) -> std::result::Result<Option<String>, std::io::Error> {
        let mut file = match File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        file.lock_shared()?;
        let mut raw = String::new();
        let result = file.read_to_string(&mut raw).await;
        file.unlock_async().await?;
        result?;
        Ok(Some(raw))
    }

    async fn write(path: &Path, bytes: &[u8]) -> std::result::Result<(), std::io::Error> {
        let mut file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .await?;

        // Truncate only once the lock is held, readers would otherwise see an empty file.
        file.lock_exclusive()?;
        let result = async {
            file.set_len(0).await?;
            file.write_all(bytes).await?;
            file.flush().await
        }
        .await;
        file.unlock_async().await?;
        result
    }
}

#[async_trait]
impl KeyValueStorage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key)?;
        debug!("Reading {path:?}");
        let Some(raw) = Self::read(&path).await? else {
            return Ok(None);
        };
        if raw.trim().is_empty() {
            warn!("Found empty value file {path:?}");
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let path = self.path_for(key)?;
        debug!("Writing {path:?}");
        let bytes = serde_json::to_vec_pretty(&value)?;
        Self::write(&path, &bytes).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keeps everything in memory. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.values.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.lock().await.remove(key);
        Ok(())
    }
}
