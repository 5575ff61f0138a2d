//! In-memory backing store.
//!
//! Cloning a `MemoryStore` yields another handle to the same map, so a
//! test can keep a handle while an engine owns another.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{BackingStore, ExclusiveAccess, NamespaceLocks};
use crate::errors::Result;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
    locks: Arc<NamespaceLocks>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries across every namespace.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Raw stored bytes, bypassing any vault.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.read().get(key).cloned()
    }

    /// Overwrite raw stored bytes, bypassing any vault.
    pub fn set_raw(&self, key: &str, bytes: Vec<u8>) {
        self.entries.write().insert(key.to_string(), bytes);
    }
}

#[async_trait]
impl BackingStore for MemoryStore {
    async fn put_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.entries.write().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn list_keys(&self, namespace: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .entries
            .read()
            .range(namespace.to_string()..)
            .take_while(|(k, _)| k.starts_with(namespace))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn clear(&self, namespace: &str) -> Result<()> {
        self.entries.write().retain(|k, _| !k.starts_with(namespace));
        Ok(())
    }

    async fn exclusive_access(&self, namespace: &str) -> Result<ExclusiveAccess> {
        Ok(self.locks.acquire(namespace).await)
    }
}
