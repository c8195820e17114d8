//! KeyValueStore trait: pluggable durable storage
//!
//! Values are whole JSON blobs under fixed keys; callers read a value, mutate
//! it in memory and write it back whole.
//! - `SledStore`: embedded sled database, durable across restarts
//! - `InMemoryStore`: for tests and throwaway runs, with an optional byte quota

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

/// Thread-safe blob storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },
    #[error("Storage lock poisoned")]
    Poisoned,
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

// ============================================================================
// Sled
// ============================================================================

/// sled-backed store. Every write is flushed before returning.
#[derive(Clone)]
pub struct SledStore {
    db: Arc<sled::Db>,
}

impl SledStore {
    /// Open (or create) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::Database(format!("{}: {e}", parent.display())))?;
        }
        let db = sled::open(path)?;
        info!(path = %path.display(), "Submission store opened");
        Ok(Self { db: Arc::new(db) })
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.db.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.db.insert(key.as_bytes(), value)?;
        self.db.flush()?;
        debug!(key, size_bytes = value.len(), "Stored value");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.db.remove(key.as_bytes())?;
        self.db.flush()?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// In-memory store. Not durable, data lost on drop.
#[derive(Default)]
pub struct InMemoryStore {
    values: RwLock<HashMap<String, Vec<u8>>>,
    /// Largest single value accepted, in bytes
    quota: Option<usize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes of values larger than `bytes`, like a full browser store.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
            quota: Some(bytes),
        }
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let values = self.values.read().map_err(|_| StorageError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        if let Some(quota) = self.quota {
            if value.len() > quota {
                return Err(StorageError::QuotaExceeded {
                    needed: value.len(),
                    quota,
                });
            }
        }
        let mut values = self.values.write().map_err(|_| StorageError::Poisoned)?;
        values.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.write().map_err(|_| StorageError::Poisoned)?;
        values.remove(key);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_put_get_remove() {
        let store = InMemoryStore::new();
        assert!(store.get("k").unwrap().is_none());
        store.put("k", b"[1,2]").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some(&b"[1,2]"[..]));
        store.remove("k").unwrap();
        assert!(store.get("k").unwrap().is_none());
    }

    #[test]
    fn test_quota_rejects_large_values() {
        let store = InMemoryStore::with_quota(4);
        assert!(store.put("k", b"1234").is_ok());
        assert!(matches!(
            store.put("k", b"12345"),
            Err(StorageError::QuotaExceeded { needed: 5, quota: 4 })
        ));
        // Previous value untouched
        assert_eq!(store.get("k").unwrap().as_deref(), Some(&b"1234"[..]));
    }

    #[test]
    fn test_sled_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("submissions.db");
        {
            let store = SledStore::open(&path).unwrap();
            store.put("pendingSubmissions", b"[]").unwrap();
        }
        let store = SledStore::open(&path).unwrap();
        assert_eq!(
            store.get("pendingSubmissions").unwrap().as_deref(),
            Some(&b"[]"[..])
        );
        assert_eq!(store.backend_name(), "sled");
    }
}
