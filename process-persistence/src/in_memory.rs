//! In-memory implementation of InstanceStore.
//!
//! Stores marshalled state in a HashMap. Useful for testing and as a
//! reference implementation.

use crate::store::{InstanceStore, StoreError};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// In-memory store keeping marshalled state in a HashMap.
///
/// Thread-safe and suitable for testing. For production use, implement
/// `InstanceStore` for a durable backend (Redis, PostgreSQL, etc.).
#[derive(Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl InstanceStore for InMemoryStore {
    fn save(&self, instance_id: &str, data: Bytes) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Store(format!("Lock error: {}", e)))?;
        entries.insert(instance_id.to_string(), data);
        Ok(())
    }

    fn load(&self, instance_id: &str) -> Result<Bytes, StoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StoreError::Store(format!("Lock error: {}", e)))?;
        entries
            .get(instance_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(instance_id.to_string()))
    }

    fn delete(&self, instance_id: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Store(format!("Lock error: {}", e)))?;
        entries
            .remove(instance_id)
            .ok_or_else(|| StoreError::NotFound(instance_id.to_string()))
            .map(|_| ())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StoreError::Store(format!("Lock error: {}", e)))?;
        Ok(entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load() {
        let store = InMemoryStore::new();
        store
            .save("i-1", Bytes::from_static(b"state"))
            .expect("save should succeed");

        let loaded = store.load("i-1").expect("load should succeed");
        assert_eq!(loaded, Bytes::from_static(b"state"));
    }

    #[test]
    fn test_save_overwrites() {
        let store = InMemoryStore::new();
        store.save("i-1", Bytes::from_static(b"old")).expect("save should succeed");
        store.save("i-1", Bytes::from_static(b"new")).expect("save should succeed");
        assert_eq!(store.load("i-1").expect("load should succeed"), Bytes::from_static(b"new"));
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let store = InMemoryStore::new();
        let result = store.load("missing");
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_delete() {
        let store = InMemoryStore::new();
        store.save("i-1", Bytes::from_static(b"state")).expect("save should succeed");
        store.delete("i-1").expect("delete should succeed");
        assert!(matches!(store.load("i-1"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete("i-1"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_list() {
        let store = InMemoryStore::new();
        store.save("i-1", Bytes::new()).expect("save should succeed");
        store.save("i-2", Bytes::new()).expect("save should succeed");

        let mut ids = store.list().expect("list should succeed");
        ids.sort();
        assert_eq!(ids, vec!["i-1", "i-2"]);
    }
}
