//! Per-vault identity and policy.
//!
//! A `VaultConfig` is built once when a vault is opened and never
//! changes afterwards.  Use `VaultConfig::builder()` for the fluent API;
//! every setting has a default so `VaultConfig::default()` is a usable
//! high-security vault named `default_vault`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audit::{AuditLogger, NoOpAuditLogger, TracingAuditLogger};
use crate::crypto::kdf::Argon2Params;
use crate::errors::{Result, VaultError};

/// Default vault name, also the storage namespace.
pub const DEFAULT_NAME: &str = "default_vault";

/// Default key alias fed into key derivation.
pub const DEFAULT_KEY_ALIAS: &str = "vault_master_key";

/// Strength of the encryption applied to stored values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionLevel {
    /// Plain pass-through.  Values are stored unencrypted.
    None,
    /// AES-128-GCM.
    Standard,
    /// AES-256-GCM.
    #[default]
    High,
}

impl EncryptionLevel {
    /// Length in bytes of the symmetric key this level needs.
    pub fn key_len(self) -> usize {
        match self {
            Self::None => 0,
            Self::Standard => 16,
            Self::High => 32,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Standard => "standard",
            Self::High => "high",
        }
    }
}

impl fmt::Display for EncryptionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity and policy for one logical vault.
#[derive(Clone)]
pub struct VaultConfig {
    name: String,
    encryption_level: EncryptionLevel,
    key_alias: String,
    cache_duration: Option<Duration>,
    audit_logger: Arc<dyn AuditLogger>,
    schema_version: u32,
    kdf_params: Argon2Params,
}

impl VaultConfig {
    /// Start a builder with the default settings.
    pub fn builder() -> VaultConfigBuilder {
        VaultConfigBuilder::default()
    }

    /// Unique vault name; also the storage namespace prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn encryption_level(&self) -> EncryptionLevel {
        self.encryption_level
    }

    /// Seed for key derivation (not the key itself).
    pub fn key_alias(&self) -> &str {
        &self.key_alias
    }

    /// Advisory in-memory cache lifetime.  The engine does not cache
    /// decrypted values itself; platform layers may honour this.
    pub fn cache_duration(&self) -> Option<Duration> {
        self.cache_duration
    }

    pub fn audit_logger(&self) -> &Arc<dyn AuditLogger> {
        &self.audit_logger
    }

    /// Schema version the calling code expects the vault to be at.
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn kdf_params(&self) -> &Argon2Params {
        &self.kdf_params
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            encryption_level: EncryptionLevel::High,
            key_alias: DEFAULT_KEY_ALIAS.to_string(),
            cache_duration: None,
            audit_logger: Arc::new(NoOpAuditLogger),
            schema_version: 1,
            kdf_params: Argon2Params::default(),
        }
    }
}

// The key alias is sensitive, so Debug only prints its length.
impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("name", &self.name)
            .field("encryption_level", &self.encryption_level)
            .field("key_alias_len", &self.key_alias.len())
            .field("cache_duration", &self.cache_duration)
            .field("schema_version", &self.schema_version)
            .field("kdf_params", &self.kdf_params)
            .finish_non_exhaustive()
    }
}

/// Fluent builder for [`VaultConfig`].
#[derive(Default)]
pub struct VaultConfigBuilder {
    config: VaultConfig,
}

impl VaultConfigBuilder {
    /// Set the vault name (must be unique per physical store).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn encryption_level(mut self, level: EncryptionLevel) -> Self {
        self.config.encryption_level = level;
        self
    }

    pub fn key_alias(mut self, alias: impl Into<String>) -> Self {
        self.config.key_alias = alias.into();
        self
    }

    /// Pass `None` to cache until the vault is dropped.
    pub fn cache_duration(mut self, duration: Option<Duration>) -> Self {
        self.config.cache_duration = duration;
        self
    }

    pub fn audit_logger(mut self, logger: Arc<dyn AuditLogger>) -> Self {
        self.config.audit_logger = logger;
        self
    }

    /// Send audit events to `tracing` instead of discarding them.
    pub fn tracing_audit(self) -> Self {
        self.audit_logger(Arc::new(TracingAuditLogger))
    }

    pub fn schema_version(mut self, version: u32) -> Self {
        self.config.schema_version = version;
        self
    }

    pub fn kdf_params(mut self, params: Argon2Params) -> Self {
        self.config.kdf_params = params;
        self
    }

    /// Validate and freeze the configuration.
    ///
    /// The name must be non-empty and free of `:` and `#`, which the
    /// engine uses to build namespaced storage keys.
    pub fn build(self) -> Result<VaultConfig> {
        let config = self.config;
        if config.name.is_empty() {
            return Err(VaultError::Config("vault name cannot be empty".into()));
        }
        if config.name.contains([':', '#']) {
            return Err(VaultError::Config(format!(
                "vault name '{}' cannot contain ':' or '#'",
                config.name
            )));
        }
        if config.schema_version < 1 {
            return Err(VaultError::Config(
                "schema version must be at least 1".into(),
            ));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = VaultConfig::default();
        assert_eq!(config.name(), "default_vault");
        assert_eq!(config.encryption_level(), EncryptionLevel::High);
        assert_eq!(config.key_alias(), "vault_master_key");
        assert_eq!(config.schema_version(), 1);
        assert!(config.cache_duration().is_none());
    }

    #[test]
    fn builder_overrides_fields() {
        let config = VaultConfig::builder()
            .name("prefs")
            .encryption_level(EncryptionLevel::Standard)
            .key_alias("alias")
            .cache_duration(Some(Duration::from_secs(30)))
            .schema_version(5)
            .build()
            .unwrap();

        assert_eq!(config.name(), "prefs");
        assert_eq!(config.encryption_level(), EncryptionLevel::Standard);
        assert_eq!(config.key_alias(), "alias");
        assert_eq!(config.cache_duration(), Some(Duration::from_secs(30)));
        assert_eq!(config.schema_version(), 5);
    }

    #[test]
    fn builder_rejects_bad_names() {
        assert!(VaultConfig::builder().name("").build().is_err());
        assert!(VaultConfig::builder().name("a:b").build().is_err());
        assert!(VaultConfig::builder().name("a#b").build().is_err());
    }

    #[test]
    fn builder_rejects_zero_schema_version() {
        assert!(VaultConfig::builder().schema_version(0).build().is_err());
    }

    #[test]
    fn debug_does_not_print_alias() {
        let config = VaultConfig::builder()
            .key_alias("super-secret-alias")
            .build()
            .unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("super-secret-alias"));
    }

    #[test]
    fn key_lengths_per_level() {
        assert_eq!(EncryptionLevel::None.key_len(), 0);
        assert_eq!(EncryptionLevel::Standard.key_len(), 16);
        assert_eq!(EncryptionLevel::High.key_len(), 32);
    }
}
