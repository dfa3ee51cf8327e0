use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::KeyValueStore;
use crate::config;

/// Session file name in the store directory
const SESSION_FILE: &str = "session.json";

/// File-backed store: all keys live in one JSON object on disk.
///
/// Suitable for headless hosts without a keychain. Reads and writes go
/// through an internal lock so concurrent tasks cannot interleave a
/// read-modify-write cycle.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    io: Mutex<()>,
}

impl FileStore {
    /// Store backed by `<dir>/session.json`.
    pub fn new(dir: PathBuf) -> Self {
        Self {
            path: dir.join(SESSION_FILE),
            io: Mutex::new(()),
        }
    }

    /// Store in the platform cache directory, e.g.
    /// `~/.cache/flora-client/session.json` on Linux.
    pub fn in_cache_dir() -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(Self::new(cache_dir.join(config::APP_NAME)))
    }

    fn read_map(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .context("Failed to read session file")?;
        serde_json::from_str(&contents).context("Failed to parse session file")
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, contents).context("Failed to write session file")
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.io.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(self.read_map()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.io.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.io.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut map = self.read_map()?;
        map.remove(key);
        self.write_map(&map)
    }

    // Single write for the whole batch instead of one per key.
    async fn multi_set(&self, pairs: &[(&str, String)]) -> Result<()> {
        let _guard = self.io.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut map = self.read_map()?;
        for (key, value) in pairs {
            map.insert((*key).to_string(), value.clone());
        }
        self.write_map(&map)
    }

    async fn multi_remove(&self, keys: &[&str]) -> Result<()> {
        let _guard = self.io.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut map = self.read_map()?;
        for key in keys {
            map.remove(*key);
        }
        self.write_map(&map)
    }
}
