use anyhow::{Context, Result};
use async_trait::async_trait;
use keyring::Entry;

use super::KeyValueStore;
use crate::config;

/// OS keychain-backed store (macOS Keychain, Windows Credential Manager,
/// Linux Secret Service) via the `keyring` crate.
///
/// Keychain calls are blocking, so every operation runs on the blocking
/// thread pool.
#[derive(Debug, Clone)]
pub struct KeychainStore {
    service: String,
}

impl KeychainStore {
    pub fn new() -> Self {
        Self::with_service(config::APP_NAME)
    }

    /// Use a non-default keychain service name. Lets tests and side-by-side
    /// installs keep their entries separate.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    async fn with_entry<T, F>(&self, key: &str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Entry) -> Result<T> + Send + 'static,
    {
        let service = self.service.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let entry = Entry::new(&service, &key).context("Failed to create keyring entry")?;
            op(entry)
        })
        .await
        .context("Keychain task was cancelled")?
    }
}

impl Default for KeychainStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for KeychainStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_entry(key, |entry| match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read key from keychain"),
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let value = value.to_string();
        self.with_entry(key, move |entry| {
            entry
                .set_password(&value)
                .context("Failed to store key in keychain")
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.with_entry(key, |entry| match entry.delete_credential() {
            Ok(()) => Ok(()),
            // Already gone is fine; logout removes keys unconditionally.
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete key from keychain"),
        })
        .await
    }
}
