use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::vault_config::{EncryptionLevel, VaultConfig, DEFAULT_KEY_ALIAS, DEFAULT_NAME};
use crate::crypto::kdf::Argon2Params;
use crate::errors::{Result, VaultError};

/// Which audit sink a settings-built vault gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSink {
    #[default]
    None,
    Tracing,
}

/// Project-level configuration, loaded from `vaultstore.toml`.
///
/// Every field has a sensible default so a vault works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Vault name (storage namespace).
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub encryption_level: EncryptionLevel,

    /// Seed for key derivation.
    #[serde(default = "default_key_alias")]
    pub key_alias: String,

    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Advisory cache lifetime in seconds (absent = no expiry).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_duration_secs: Option<u64>,

    /// Directory (relative to project root) used by the file store.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: String,

    /// Argon2 memory cost in KiB (default: 64 MB).
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    /// Argon2 iteration count (default: 3).
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2 parallelism degree (default: 4).
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,

    #[serde(default)]
    pub audit: AuditSink,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_key_alias() -> String {
    DEFAULT_KEY_ALIAS.to_string()
}

fn default_schema_version() -> u32 {
    1
}

fn default_storage_dir() -> String {
    ".vaultstore".to_string()
}

fn default_argon2_memory_kib() -> u32 {
    65_536 // 64 MB
}

fn default_argon2_iterations() -> u32 {
    3
}

fn default_argon2_parallelism() -> u32 {
    4
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: default_name(),
            encryption_level: EncryptionLevel::default(),
            key_alias: default_key_alias(),
            schema_version: default_schema_version(),
            cache_duration_secs: None,
            storage_dir: default_storage_dir(),
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
            audit: AuditSink::default(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the project root.
    const FILE_NAME: &'static str = "vaultstore.toml";

    /// Load settings from `<project_dir>/vaultstore.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            VaultError::Config(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        Ok(settings)
    }

    /// Directory the file store should use for this project.
    ///
    /// Example: `project_dir/.vaultstore`
    pub fn storage_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.storage_dir)
    }

    /// Convert the Argon2 settings into crypto-layer params.
    pub fn argon2_params(&self) -> Argon2Params {
        Argon2Params {
            memory_kib: self.argon2_memory_kib,
            iterations: self.argon2_iterations,
            parallelism: self.argon2_parallelism,
        }
    }

    /// Build the immutable vault configuration these settings describe.
    pub fn vault_config(&self) -> Result<VaultConfig> {
        let builder = VaultConfig::builder()
            .name(self.name.clone())
            .encryption_level(self.encryption_level)
            .key_alias(self.key_alias.clone())
            .schema_version(self.schema_version)
            .cache_duration(self.cache_duration_secs.map(Duration::from_secs))
            .kdf_params(self.argon2_params());

        let builder = match self.audit {
            AuditSink::None => builder,
            AuditSink::Tracing => builder.tracing_audit(),
        };

        builder.build()
    }
}

// ── Tests ────────────────────────────────────────────────────────────
