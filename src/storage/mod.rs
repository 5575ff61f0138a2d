//! Byte-oriented persistence behind a vault.
//!
//! The engine never touches a disk, keystore or preference database
//! directly.  It talks to a [`BackingStore`], which only has to
//! round-trip arbitrary byte strings under arbitrary key strings and hand
//! out an exclusive section per namespace.
//!
//! Keys arrive already namespaced as `"{vault}:{key}"`; `list_keys` and
//! `clear` receive the namespace prefix `"{vault}:"`.
//!
//! This module provides:
//! - The `BackingStore` trait and its `ExclusiveAccess` guard
//! - `NamespaceLocks`, the per-namespace async mutex map adapters share
//! - `MemoryStore` (`memory`) and `FileStore` (`file`) adapters

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;

use crate::errors::Result;

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Persistence contract consumed by the vault engine.
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Store `bytes` under `key`, replacing any previous value.
    async fn put_bytes(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Read the bytes under `key`, or `None` if it was never written.
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete `key`.  Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Every stored key that starts with `namespace`, unstripped.
    async fn list_keys(&self, namespace: &str) -> Result<BTreeSet<String>>;

    /// Delete every key that starts with `namespace`.
    async fn clear(&self, namespace: &str) -> Result<()>;

    /// Enter the critical section for `namespace`.
    ///
    /// No other caller going through this adapter can enter the same
    /// namespace's section until the returned guard is dropped.
    async fn exclusive_access(&self, namespace: &str) -> Result<ExclusiveAccess>;
}

/// Guard for an adapter's exclusive section.  Dropping it leaves the section.
#[must_use = "the exclusive section ends as soon as the guard is dropped"]
pub struct ExclusiveAccess {
    _guard: OwnedMutexGuard<()>,
}

/// Per-namespace async mutexes, created on first use.
#[derive(Debug, Default)]
pub struct NamespaceLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl NamespaceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the section for `namespace`.
    pub async fn acquire(&self, namespace: &str) -> ExclusiveAccess {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(namespace.to_string()).or_default())
        };

        ExclusiveAccess {
            _guard: lock.lock_owned().await,
        }
    }
}
