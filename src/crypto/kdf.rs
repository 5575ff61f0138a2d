//! Password-based key derivation using Argon2id.
//!
//! The vault's key alias is treated as a password: Argon2id stretches it
//! into a 32-byte master key.  The salt is derived from the vault name,
//! so two vaults sharing an alias still end up with different keys while
//! re-opening the same vault always yields the same key.

use argon2::{Algorithm, Argon2, Params, Version};
use sha2::{Digest, Sha256};

use crate::errors::{Result, VaultError};

/// Length of the per-vault salt in bytes (256 bits).
pub const SALT_LEN: usize = 32;

/// Length of the Argon2id output in bytes (256 bits).
const MASTER_KEY_LEN: usize = 32;

/// Domain-separation prefix mixed into every vault salt.
const SALT_CONTEXT: &[u8] = b"vaultstore-salt:";

/// Configurable Argon2id parameters.
///
/// These map 1:1 to the fields in `Settings` so a project can tune
/// them in `vaultstore.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Params {
    /// Memory cost in KiB (default: 65 536 = 64 MB).
    pub memory_kib: u32,
    /// Number of iterations (default: 3).
    pub iterations: u32,
    /// Parallelism lanes (default: 4).
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_kib: 65_536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// Minimum safe memory cost in KiB (8 MB).
pub const MIN_MEMORY_KIB: u32 = 8_192;

/// Derive a 32-byte master key with explicit Argon2id parameters.
///
/// The same alias + salt + params will always produce the same key.
/// An empty alias is accepted (and yields a weak but valid key).
/// Enforces minimum Argon2 parameters to prevent dangerously weak KDF settings.
pub fn derive_master_key_with_params(
    alias: &[u8],
    salt: &[u8],
    argon2_params: &Argon2Params,
) -> Result<[u8; MASTER_KEY_LEN]> {
    if argon2_params.memory_kib < MIN_MEMORY_KIB {
        return Err(VaultError::KeyDerivation(format!(
            "Argon2 memory_kib must be at least {MIN_MEMORY_KIB} (got {})",
            argon2_params.memory_kib
        )));
    }
    if argon2_params.iterations < 1 {
        return Err(VaultError::KeyDerivation(
            "Argon2 iterations must be at least 1".into(),
        ));
    }
    if argon2_params.parallelism < 1 {
        return Err(VaultError::KeyDerivation(
            "Argon2 parallelism must be at least 1".into(),
        ));
    }

    let params = Params::new(
        argon2_params.memory_kib,
        argon2_params.iterations,
        argon2_params.parallelism,
        Some(MASTER_KEY_LEN),
    )
    .map_err(|e| VaultError::KeyDerivation(format!("invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; MASTER_KEY_LEN];
    argon2
        .hash_password_into(alias, salt, &mut key)
        .map_err(|e| VaultError::KeyDerivation(format!("Argon2id hashing failed: {e}")))?;

    Ok(key)
}

/// Per-vault salt: `SHA-256("vaultstore-salt:" || vault_name)`.
pub fn vault_salt(vault_name: &str) -> [u8; SALT_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(SALT_CONTEXT);
    hasher.update(vault_name.as_bytes());

    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&hasher.finalize());
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> Argon2Params {
        Argon2Params {
            memory_kib: MIN_MEMORY_KIB,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn same_inputs_same_key() {
        let salt = vault_salt("v");
        let a = derive_master_key_with_params(b"alias", &salt, &fast()).unwrap();
        let b = derive_master_key_with_params(b"alias", &salt, &fast()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_alias_is_accepted() {
        let salt = vault_salt("v");
        assert!(derive_master_key_with_params(b"", &salt, &fast()).is_ok());
    }

    #[test]
    fn weak_params_are_rejected() {
        let salt = vault_salt("v");
        let weak = Argon2Params {
            memory_kib: 1_024,
            ..fast()
        };
        assert!(matches!(
            derive_master_key_with_params(b"alias", &salt, &weak),
            Err(VaultError::KeyDerivation(_))
        ));

        let zero_iter = Argon2Params {
            iterations: 0,
            ..fast()
        };
        assert!(derive_master_key_with_params(b"alias", &salt, &zero_iter).is_err());
    }

    #[test]
    fn salt_depends_on_vault_name() {
        assert_eq!(vault_salt("a"), vault_salt("a"));
        assert_ne!(vault_salt("a"), vault_salt("b"));
    }
}
