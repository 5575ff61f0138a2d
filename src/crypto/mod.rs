//! Cryptographic primitives for vaultstore.
//!
//! This module provides:
//! - Argon2id alias-based master key derivation and per-vault salts (`kdf`)
//! - HKDF expansion into level-sized, zeroize-on-drop vault keys (`keys`)
//! - AES-GCM encryption and decryption with IV-prefixed frames (`encryption`)
//! - The `Cipher` capability the vault engine encrypts through (`cipher`)

pub mod cipher;
pub mod encryption;
pub mod kdf;
pub mod keys;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{encrypt, decrypt, derive_key, ...};
pub use cipher::{AeadCipher, Cipher};
pub use encryption::{decrypt, encrypt, CipherFrame, IV_LEN, TAG_LEN};
pub use kdf::{derive_master_key_with_params, vault_salt, Argon2Params};
pub use keys::{derive_key, DerivedKey, MasterKey};
