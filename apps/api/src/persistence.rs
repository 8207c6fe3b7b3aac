//! Key-value persistence behind the job and file stores.
//!
//! Stores keep their state in memory and write a serialized snapshot here on
//! every mutation. Writes are last-writer-wins; nothing is transactional.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::config::StorageBackend;

const REDIS_KEY_PREFIX: &str = "jobcraft:";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Errors raised by the job and file stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Job {0} not found")]
    JobNotFound(Uuid),

    #[error("File {0} not found")]
    FileNotFound(Uuid),

    #[error("{0}")]
    InvalidFile(String),

    #[error("{0}")]
    FileTooLarge(String),

    #[error("Not enough storage space ({requested} bytes requested, {available} available). Please delete some files first.")]
    QuotaExceeded { requested: u64, available: u64 },

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// A string key-value store. One key per store snapshot.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    async fn save(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
    async fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

/// Opens the persistence backend selected by configuration.
pub async fn connect(backend: &StorageBackend) -> Result<Arc<dyn Persistence>> {
    match backend {
        StorageBackend::Memory => {
            info!("Using in-memory persistence (state is lost on restart)");
            Ok(Arc::new(MemoryPersistence::default()))
        }
        StorageBackend::File(dir) => {
            tokio::fs::create_dir_all(dir).await?;
            info!("Using file persistence in {}", dir.display());
            Ok(Arc::new(FilePersistence::new(dir.clone())))
        }
        StorageBackend::Redis(url) => {
            info!("Connecting to Redis...");
            let client = redis::Client::open(url.as_str())?;
            let conn = ConnectionManager::new(client).await?;
            info!("Redis persistence established");
            Ok(Arc::new(RedisPersistence { conn }))
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryPersistence {
    entries: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.lock().get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.lock().remove(key);
        Ok(())
    }
}

impl MemoryPersistence {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still a valid map.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// JSON files
// ────────────────────────────────────────────────────────────────────────────

/// One `<key>.json` file per key inside `dir`.
pub struct FilePersistence {
    dir: PathBuf,
}

impl FilePersistence {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl Persistence for FilePersistence {
    async fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Redis
// ────────────────────────────────────────────────────────────────────────────

pub struct RedisPersistence {
    conn: ConnectionManager,
}

#[async_trait]
impl Persistence for RedisPersistence {
    async fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(format!("{REDIS_KEY_PREFIX}{key}")).await?;
        Ok(value)
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(format!("{REDIS_KEY_PREFIX}{key}"), value)
            .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(format!("{REDIS_KEY_PREFIX}{key}")).await?;
        Ok(())
    }
}
