//! Persistent key-value storage for session state.
//!
//! The session store and API client never pick a backend themselves; they
//! receive a `KeyValueStore` capability at construction time. Three backends
//! are provided:
//!
//! - `KeychainStore`: OS keychain via the `keyring` crate (production)
//! - `FileStore`: JSON file in the cache directory (headless hosts)
//! - `MemoryStore`: process-lifetime map (tests, ephemeral sessions)

pub mod file;
pub mod keychain;
pub mod memory;

pub use file::FileStore;
pub use keychain::KeychainStore;
pub use memory::MemoryStore;

use anyhow::Result;
use async_trait::async_trait;

/// Async string key-value storage capability.
///
/// There is no transactional multi-key primitive: `multi_set` and
/// `multi_remove` are best effort and report failure if any individual
/// write fails.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;

    /// Write several keys as one logical unit.
    async fn multi_set(&self, pairs: &[(&str, String)]) -> Result<()> {
        for (key, value) in pairs {
            self.set(key, value).await?;
        }
        Ok(())
    }

    /// Remove several keys as one logical unit.
    async fn multi_remove(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.remove(key).await?;
        }
        Ok(())
    }
}
