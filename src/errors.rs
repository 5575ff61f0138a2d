use thiserror::Error;

/// All errors that can occur in vaultstore.
#[derive(Debug, Error)]
pub enum VaultError {
    // --- Crypto errors ---
    #[error("Authentication failed: wrong key or tampered/corrupted data")]
    Authentication,

    #[error("Malformed cipher frame: {len} bytes, need at least {min}")]
    MalformedFrame { len: usize, min: usize },

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Cipher does not meet the configured encryption level: {0}")]
    NonConformantCipher(String),

    // --- Storage errors ---
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Lifecycle errors ---
    #[error("Vault initialization failed: {0}")]
    Initialization(String),

    // --- Config errors ---
    #[error("Config error: {0}")]
    Config(String),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    Serialization(String),

    // --- Migration errors ---
    #[error("Migration failed: {0}")]
    Migration(String),

    // --- Audit errors ---
    #[error("Audit error: {0}")]
    Audit(String),
}

impl VaultError {
    /// Wrap an adapter failure with the operation and key it hit.
    pub fn storage(operation: &str, key: &str, cause: impl std::fmt::Display) -> Self {
        Self::Storage(format!("{operation} '{key}': {cause}"))
    }
}

/// Convenience type alias for vaultstore results.
pub type Result<T> = std::result::Result<T, VaultError>;
