//! Typed handles bound to a single vault key.

use crate::crypto::{AeadCipher, Cipher};
use crate::errors::Result;
use crate::storage::BackingStore;

use super::engine::VaultEngine;
use super::observe::Observer;
use super::value::VaultValue;

/// A key of one vault, fixed to type `T`, with an optional default.
///
/// An entry holds no value of its own; every call goes through the
/// engine, so entries for the same key always agree.
pub struct Entry<'a, S, C = AeadCipher, T = String> {
    vault: &'a VaultEngine<S, C>,
    key: String,
    default: Option<T>,
}

impl<'a, S, C, T> Entry<'a, S, C, T>
where
    S: BackingStore,
    C: Cipher,
    T: VaultValue + Clone,
{
    pub(crate) fn new(vault: &'a VaultEngine<S, C>, key: &str, default: Option<T>) -> Self {
        Self {
            vault,
            key: key.to_string(),
            default,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn default_value(&self) -> Option<&T> {
        self.default.as_ref()
    }

    /// The stored value, or `None` if absent or not a `T`.
    pub async fn get(&self) -> Result<Option<T>> {
        self.vault.get(&self.key).await
    }

    /// The stored value, falling back to the entry's default.
    pub async fn get_or_default(&self) -> Result<Option<T>> {
        Ok(self.get().await?.or_else(|| self.default.clone()))
    }

    pub async fn set(&self, value: &T) -> Result<()> {
        self.vault.put(&self.key, value).await
    }

    pub async fn remove(&self) -> Result<()> {
        self.vault.remove(&self.key).await
    }

    pub async fn is_set(&self) -> Result<bool> {
        self.vault.contains(&self.key).await
    }

    /// Observe the key as `T`.  Absence is reported as `None`; the
    /// default is not substituted.
    pub async fn observe(&self) -> Result<Observer<T>> {
        self.vault.observe(&self.key).await
    }
}
