//! Key material and the vault key deriver.
//!
//! Derivation runs in two stages:
//! 1. Argon2id turns the key alias + vault salt into a 32-byte
//!    **master key** (see `kdf`).
//! 2. HKDF-SHA256 expands the master key into the level-sized
//!    **vault key** (16 bytes for STANDARD, 32 for HIGH), with the level
//!    bound into the `info` string so the two levels never share a key.
//!
//! Both wrappers zero their bytes on drop.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use super::kdf::{derive_master_key_with_params, Argon2Params};
use crate::config::EncryptionLevel;
use crate::errors::{Result, VaultError};

/// Length of the master key (256 bits).
const MASTER_KEY_LEN: usize = 32;

/// A wrapper around a 32-byte master key that automatically zeroes
/// its memory when dropped.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct MasterKey {
    bytes: [u8; MASTER_KEY_LEN],
}

impl MasterKey {
    /// Create a new `MasterKey` from raw bytes.
    pub fn new(bytes: [u8; MASTER_KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Access the raw key bytes (e.g. to pass to HKDF).
    pub fn as_bytes(&self) -> &[u8; MASTER_KEY_LEN] {
        &self.bytes
    }

    /// Expand this master key into the vault key for `level`.
    pub fn derive_vault_key(&self, level: EncryptionLevel) -> Result<DerivedKey> {
        let info = format!("vaultstore-key:{level}");
        let bytes = hkdf_derive(&self.bytes, info.as_bytes(), level.key_len())?;
        Ok(DerivedKey { bytes, level })
    }
}

/// The symmetric key a vault encrypts with.
///
/// Its length always matches `level().key_len()`: empty for NONE,
/// 16 bytes for STANDARD, 32 bytes for HIGH.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct DerivedKey {
    bytes: Vec<u8>,
    #[zeroize(skip)]
    level: EncryptionLevel,
}

impl DerivedKey {
    /// Wrap externally provisioned key bytes (e.g. from a platform keystore).
    ///
    /// Fails if the length does not match the level.
    pub fn from_bytes(bytes: Vec<u8>, level: EncryptionLevel) -> Result<Self> {
        if bytes.len() != level.key_len() {
            let got = bytes.len();
            let mut bytes = bytes;
            bytes.zeroize();
            return Err(VaultError::KeyDerivation(format!(
                "{level} key must be {} bytes, got {got}",
                level.key_len()
            )));
        }
        Ok(Self { bytes, level })
    }

    /// The empty key used by the NONE level.
    pub fn none() -> Self {
        Self {
            bytes: Vec::new(),
            level: EncryptionLevel::None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn level(&self) -> EncryptionLevel {
        self.level
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Derive the vault key for `(alias, level, salt)`.
///
/// Deterministic for identical inputs.  The NONE level returns an empty
/// key without running the (expensive) KDF.
pub fn derive_key(
    alias: &str,
    level: EncryptionLevel,
    salt: &[u8],
    params: &Argon2Params,
) -> Result<DerivedKey> {
    if level == EncryptionLevel::None {
        return Ok(DerivedKey::none());
    }

    let mut master_bytes = derive_master_key_with_params(alias.as_bytes(), salt, params)?;
    let master_key = MasterKey::new(master_bytes);
    master_bytes.zeroize();

    master_key.derive_vault_key(level)
}

/// Internal helper: run HKDF-SHA256 expand with the given `info`.
///
/// The master key already has high entropy (it came from Argon2id), so
/// no extract salt is used.
fn hkdf_derive(ikm: &[u8], info: &[u8], len: usize) -> Result<Vec<u8>> {
    let hk = Hkdf::<Sha256>::new(None, ikm);

    let mut okm = vec![0u8; len];
    hk.expand(info, &mut okm)
        .map_err(|e| VaultError::KeyDerivation(format!("HKDF expand failed: {e}")))?;

    Ok(okm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::kdf::{vault_salt, MIN_MEMORY_KIB};

    fn fast() -> Argon2Params {
        Argon2Params {
            memory_kib: MIN_MEMORY_KIB,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn key_length_follows_level() {
        let salt = vault_salt("v");
        for level in [
            EncryptionLevel::None,
            EncryptionLevel::Standard,
            EncryptionLevel::High,
        ] {
            let key = derive_key("alias", level, &salt, &fast()).unwrap();
            assert_eq!(key.len(), level.key_len());
            assert_eq!(key.level(), level);
        }
    }

    #[test]
    fn derivation_is_deterministic() {
        let salt = vault_salt("v");
        let a = derive_key("alias", EncryptionLevel::High, &salt, &fast()).unwrap();
        let b = derive_key("alias", EncryptionLevel::High, &salt, &fast()).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn levels_do_not_share_key_prefix() {
        let salt = vault_salt("v");
        let standard = derive_key("alias", EncryptionLevel::Standard, &salt, &fast()).unwrap();
        let high = derive_key("alias", EncryptionLevel::High, &salt, &fast()).unwrap();
        assert_ne!(standard.as_bytes(), &high.as_bytes()[..16]);
    }

    #[test]
    fn different_salt_different_key() {
        let a = derive_key("alias", EncryptionLevel::High, &vault_salt("a"), &fast()).unwrap();
        let b = derive_key("alias", EncryptionLevel::High, &vault_salt("b"), &fast()).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn from_bytes_checks_length() {
        assert!(DerivedKey::from_bytes(vec![0u8; 32], EncryptionLevel::High).is_ok());
        assert!(DerivedKey::from_bytes(vec![0u8; 16], EncryptionLevel::High).is_err());
        assert!(DerivedKey::from_bytes(vec![], EncryptionLevel::None).is_ok());
    }
}
