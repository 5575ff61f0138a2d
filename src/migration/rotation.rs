//! Re-encrypting a vault's keys under a different key.
//!
//! Rotation reads each value from the old engine, writes it through the
//! new engine and then removes it from the old one.  Keys are handled
//! independently: one failing key is reported and the rest carry on.
//!
//! The old and new engines must not share both a store and a vault name,
//! or the final remove would delete the value just written.

use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::crypto::Cipher;
use crate::errors::{Result, VaultError};
use crate::storage::BackingStore;
use crate::vault::VaultEngine;

/// A key that could not be rotated, with the reason.
#[derive(Debug)]
pub struct RotationFailure {
    pub key: String,
    pub error: VaultError,
}

/// Per-key result of a rotation run.
#[derive(Debug, Default)]
pub struct RotationReport {
    /// Keys now readable through the new engine and gone from the old one.
    pub rotated: Vec<String>,
    /// Keys that had no value in the old engine.
    pub missing: Vec<String>,
    pub failed: Vec<RotationFailure>,
}

impl RotationReport {
    /// `true` if no key failed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Move `keys` from `old` to `new`, re-encrypting each value.
///
/// Values are moved as their canonical bytes, so strings, numbers,
/// booleans, raw bytes and objects all survive unchanged.  A key whose
/// write to `new` succeeded but whose removal from `old` failed is
/// reported as failed; its value then exists in both vaults.
pub async fn rotate_key<S1, C1, S2, C2, I>(
    old: &VaultEngine<S1, C1>,
    new: &VaultEngine<S2, C2>,
    keys: I,
) -> RotationReport
where
    S1: BackingStore,
    C1: Cipher,
    S2: BackingStore,
    C2: Cipher,
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut report = RotationReport::default();

    for key in keys {
        let key = key.as_ref();
        match rotate_one(old, new, key).await {
            Ok(true) => report.rotated.push(key.to_string()),
            Ok(false) => report.missing.push(key.to_string()),
            Err(error) => {
                warn!(from = old.name(), to = new.name(), key, error = %error, "key rotation failed");
                report.failed.push(RotationFailure {
                    key: key.to_string(),
                    error,
                });
            }
        }
    }

    info!(
        from = old.name(),
        to = new.name(),
        rotated = report.rotated.len(),
        missing = report.missing.len(),
        failed = report.failed.len(),
        "key rotation finished"
    );
    report
}

/// Rotate every key currently stored in `old`.
pub async fn rotate_all<S1, C1, S2, C2>(
    old: &VaultEngine<S1, C1>,
    new: &VaultEngine<S2, C2>,
) -> Result<RotationReport>
where
    S1: BackingStore,
    C1: Cipher,
    S2: BackingStore,
    C2: Cipher,
{
    let keys = old.keys().await?;
    Ok(rotate_key(old, new, keys).await)
}

async fn rotate_one<S1, C1, S2, C2>(
    old: &VaultEngine<S1, C1>,
    new: &VaultEngine<S2, C2>,
    key: &str,
) -> Result<bool>
where
    S1: BackingStore,
    C1: Cipher,
    S2: BackingStore,
    C2: Cipher,
{
    let Some(bytes) = old.get_verified::<Vec<u8>>(key).await? else {
        return Ok(false);
    };
    let bytes = Zeroizing::new(bytes);

    new.put(key, &*bytes).await?;
    old.remove(key).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EncryptionLevel, VaultConfig};
    use crate::crypto::kdf::{Argon2Params, MIN_MEMORY_KIB};
    use crate::storage::MemoryStore;

    fn vault(store: &MemoryStore, name: &str, alias: &str) -> VaultEngine<MemoryStore> {
        let config = VaultConfig::builder()
            .name(name)
            .key_alias(alias)
            .encryption_level(EncryptionLevel::Standard)
            .kdf_params(Argon2Params {
                memory_kib: MIN_MEMORY_KIB,
                iterations: 1,
                parallelism: 1,
            })
            .build()
            .unwrap();
        VaultEngine::open(config, store.clone()).unwrap()
    }

    #[tokio::test]
    async fn missing_keys_are_reported_not_failed() {
        let store = MemoryStore::new();
        let old = vault(&store, "old", "alias-1");
        let new = vault(&store, "new", "alias-2");
        old.put_string("present", "x").await.unwrap();

        let report = rotate_key(&old, &new, ["present", "absent"]).await;
        assert_eq!(report.rotated, vec!["present".to_string()]);
        assert_eq!(report.missing, vec!["absent".to_string()]);
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn rotated_bytes_keep_their_type() {
        let store = MemoryStore::new();
        let old = vault(&store, "old", "alias-1");
        let new = vault(&store, "new", "alias-2");
        old.put_double("ratio", 0.25).await.unwrap();

        let report = rotate_all(&old, &new).await.unwrap();
        assert!(report.is_complete());
        assert_eq!(new.get_double("ratio").await.unwrap(), Some(0.25));
        assert!(old.keys().await.unwrap().is_empty());
    }
}
