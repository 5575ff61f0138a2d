//! Vault configuration.
//!
//! This module provides:
//! - `EncryptionLevel` and the immutable per-vault `VaultConfig` (`vault_config`)
//! - Project-level `Settings` loaded from `vaultstore.toml` (`settings`)

pub mod settings;
pub mod vault_config;

pub use settings::{AuditSink, Settings};
pub use vault_config::{EncryptionLevel, VaultConfig, VaultConfigBuilder};
