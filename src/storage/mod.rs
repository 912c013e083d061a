//! Persistence layer.
//!
//! All durable state (price cache, settings, pinned items) is kept as JSON
//! blobs under string keys in a [`KeyValueStore`]. The JSON file backend is
//! the default; the SQLite backend keeps the same blobs in a single table.

pub mod sqlite;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

pub use sqlite::SqliteStore;

/// Storage keys used by the crate.
pub mod keys {
    pub const LOCKED_ITEMS: &str = "lockedItems";
    pub const FIXED_ITEMS: &str = "fixeditems";
    pub const PRICES: &str = "futggPrices";
    pub const SETTINGS: &str = "sbcSolverSettings";
}

/// Durable string-keyed blob store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn put(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Load and deserialise a JSON value. Missing keys yield `None`.
pub async fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    match store.get(key).await? {
        Some(raw) => {
            let value = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse stored value for '{key}'"))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

pub async fn save_json<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)
        .with_context(|| format!("Failed to serialise value for '{key}'"))?;
    store.put(key, &raw).await
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

/// Default state file path.
pub const DEFAULT_STATE_FILE: &str = "sbcpilot_state.json";

/// Keeps every key in one pretty-printed JSON object on disk.
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open the store, reading the existing file if present.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let json = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read state from {}", path.display()))?;
            let entries: BTreeMap<String, String> = serde_json::from_str(&json)
                .with_context(|| format!("Failed to parse state from {}", path.display()))?;
            info!(path = %path.display(), keys = entries.len(), "State loaded from disk");
            entries
        } else {
            info!(path = %path.display(), "No saved state found, starting fresh");
            BTreeMap::new()
        };

        Ok(Self { path, entries: Mutex::new(entries) })
    }

    async fn flush(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(entries).context("Failed to serialise state")?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("Failed to write state to {}", self.path.display()))?;
        debug!(path = %self.path.display(), keys = entries.len(), "State saved");
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_some() {
            self.flush(&entries).await?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Volatile store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
