//! Persistent key-value storage and secrets
//!
//! The automation network hands every invocation a small string store that
//! survives between runs, plus a read-only secret bag. Both sit behind
//! traits so keepers can run against memory in tests and the CLI.

use crate::error::KeeperError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Default key under which a keeper records its last execution time
pub const LAST_TIMESTAMP_KEY: &str = "lastTimestamp";

/// String store persisted across invocations of one task
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, KeeperError>;
    async fn set(&self, key: &str, value: String) -> Result<(), KeeperError>;

    /// Read a key as an unsigned integer, treating unset or unparsable as 0
    async fn get_u64(&self, key: &str) -> Result<u64, KeeperError> {
        Ok(self.get(key).await?.and_then(|v| v.trim().parse().ok()).unwrap_or(0))
    }
}

/// Read-only secret provider
pub trait SecretStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Fetch a secret or fail with a message naming it
    fn require(&self, key: &str) -> Result<String, KeeperError> {
        self.get(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| KeeperError::MissingSecret(key.to_string()))
    }
}

// ============================================
// IN-MEMORY STORE
// ============================================

/// Store backed by a map, used by the CLI runner and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store, e.g. from a `--storage` JSON object
    pub fn with_entries(entries: HashMap<String, String>) -> Self {
        Self { entries: RwLock::new(entries) }
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.entries.read().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KeeperError> {
        let entries = self.entries.read().map_err(KeeperError::storage)?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), KeeperError> {
        let mut entries = self.entries.write().map_err(KeeperError::storage)?;
        entries.insert(key.to_string(), value);
        Ok(())
    }
}

// ============================================
// SECRETS
// ============================================

/// Secrets from a fixed map
#[derive(Debug, Default, Clone)]
pub struct MemorySecrets {
    values: HashMap<String, String>,
}

impl MemorySecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl SecretStore for MemorySecrets {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Secrets resolved from the process environment (after `.env` is loaded)
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecrets;

impl SecretStore for EnvSecrets {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get(LAST_TIMESTAMP_KEY).await.unwrap(), None);
        assert_eq!(store.get_u64(LAST_TIMESTAMP_KEY).await.unwrap(), 0);

        store.set(LAST_TIMESTAMP_KEY, "1700000000".to_string()).await.unwrap();
        assert_eq!(store.get_u64(LAST_TIMESTAMP_KEY).await.unwrap(), 1_700_000_000);
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn test_require_names_missing_secret() {
        let secrets = MemorySecrets::new().with("ODOS_KEY", "");
        let err = secrets.require("ZEROX_API_KEY").unwrap_err();
        assert_eq!(err.to_string(), "ZEROX_API_KEY not set in secrets");
        // empty counts as missing
        assert!(secrets.require("ODOS_KEY").is_err());
    }
}
