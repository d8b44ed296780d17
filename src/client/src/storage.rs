//! Persistent session storage
//!
//! Session state is kept as JSON text under a handful of fixed keys. The
//! backing store is injected so the CLI can use files while tests use memory.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Result;

pub const KEY_ENDPOINT_CONFIG: &str = "ml-tester-config";
pub const KEY_VISION_CONFIG: &str = "ml-tester-vision-config";
pub const KEY_USE_PROXY: &str = "ml-tester-use-proxy";
pub const KEY_SERVICE: &str = "ml-tester-service";
pub const KEY_HISTORY: &str = "ml-tester-history";

/// String key/value persistence
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<String>>;
    async fn set_raw(&self, key: &str, value: String) -> Result<()>;
}

/// Read and decode `key`, falling back to `default` when it is absent or
/// unreadable
pub async fn load_or_default<T>(store: &dyn KeyValueStore, key: &str, default: T) -> T
where
    T: DeserializeOwned,
{
    match store.get_raw(key).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = key, error = %e, "Stored value is not valid JSON, using default");
                default
            }
        },
        Ok(None) => default,
        Err(e) => {
            warn!(key = key, error = %e, "Failed to read stored value, using default");
            default
        }
    }
}

/// Encode and write `value` under `key`. Failures are logged and dropped.
pub async fn save<T>(store: &dyn KeyValueStore, key: &str, value: &T)
where
    T: Serialize + ?Sized,
{
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(key = key, error = %e, "Failed to encode value for storage");
            return;
        }
    };

    if let Err(e) = store.set_raw(key, raw).await {
        warn!(key = key, error = %e, "Failed to save to storage");
    }
}

// ============================================================================
// FILE STORE
// ============================================================================

/// One `<key>.json` file per key inside a directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_raw(&self, key: &str, value: String) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        tokio::fs::write(&path, value).await?;
        debug!(path = %path.display(), "Saved session value");
        Ok(())
    }
}

// ============================================================================
// MEMORY STORE
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set_raw(&self, key: &str, value: String) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }
}
