//! Integration tests for backing stores, settings and the SQLite audit log.

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;
use vaultstore::config::{EncryptionLevel, Settings, VaultConfig};
use vaultstore::crypto::kdf::MIN_MEMORY_KIB;
use vaultstore::crypto::Argon2Params;
use vaultstore::storage::{BackingStore, FileStore, MemoryStore};
use vaultstore::{VaultEngine, VaultError};

fn fast_config(name: &str) -> VaultConfig {
    VaultConfig::builder()
        .name(name)
        .kdf_params(Argon2Params {
            memory_kib: MIN_MEMORY_KIB,
            iterations: 1,
            parallelism: 1,
        })
        .build()
        .expect("config")
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

#[tokio::test]
async fn file_store_contract() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::open(dir.path().join("data")).await.unwrap();

    store.put_bytes("v:a", b"1").await.unwrap();
    store.put_bytes("v:b", b"2").await.unwrap();
    store.put_bytes("w:a", b"3").await.unwrap();

    assert_eq!(store.get_bytes("v:a").await.unwrap(), Some(b"1".to_vec()));
    assert_eq!(store.list_keys("v:").await.unwrap().len(), 2);

    store.put_bytes("v:a", b"one").await.unwrap();
    assert_eq!(store.get_bytes("v:a").await.unwrap(), Some(b"one".to_vec()));

    store.clear("v:").await.unwrap();
    assert!(store.list_keys("v:").await.unwrap().is_empty());
    assert_eq!(store.get_bytes("w:a").await.unwrap(), Some(b"3".to_vec()));
}

#[tokio::test]
async fn file_store_ignores_foreign_files() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::open(dir.path()).await.unwrap();
    fs::write(dir.path().join("README.txt"), "not a vault entry").unwrap();

    store.put_bytes("v:a", b"1").await.unwrap();
    let keys: Vec<String> = store.list_keys("").await.unwrap().into_iter().collect();
    assert_eq!(keys, vec!["v:a".to_string()]);
}

#[tokio::test]
async fn vault_on_file_store_survives_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let store = FileStore::open(dir.path()).await.unwrap();
        let vault = VaultEngine::open(fast_config("disk"), store).unwrap();
        vault.put_string("api_key", "sk-live-123").await.unwrap();
        vault.put_int("retries", 4).await.unwrap();
    }

    // Nothing on disk is plaintext.
    for entry in fs::read_dir(dir.path()).unwrap() {
        let bytes = fs::read(entry.unwrap().path()).unwrap();
        assert!(!bytes.windows(11).any(|w| w == b"sk-live-123"));
    }

    let store = FileStore::open(dir.path()).await.unwrap();
    let vault = VaultEngine::open(fast_config("disk"), store).unwrap();
    assert_eq!(
        vault.get_string("api_key").await.unwrap().as_deref(),
        Some("sk-live-123")
    );
    assert_eq!(vault.get_int("retries").await.unwrap(), Some(4));
    assert_eq!(vault.keys().await.unwrap().len(), 2);
}

#[tokio::test]
async fn exclusive_access_serializes_a_namespace() {
    let store = Arc::new(MemoryStore::new());

    let guard = store.exclusive_access("v:").await.unwrap();
    let other = Arc::clone(&store);
    let waiter = tokio::spawn(async move {
        let _guard = other.exclusive_access("v:").await.unwrap();
        other.put_bytes("v:after", b"x").await.unwrap();
    });

    // A different namespace is not blocked.
    let _unrelated = store.exclusive_access("w:").await.unwrap();

    tokio::task::yield_now().await;
    assert!(store.raw("v:after").is_none());

    drop(guard);
    waiter.await.unwrap();
    assert_eq!(store.raw("v:after"), Some(b"x".to_vec()));
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[test]
fn settings_file_drives_vault_config() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("vaultstore.toml"),
        r#"
name = "prefs"
encryption_level = "standard"
key_alias = "prefs_key"
schema_version = 4
cache_duration_secs = 60
storage_dir = "secrets"
argon2_memory_kib = 8192
argon2_iterations = 1
argon2_parallelism = 1
audit = "tracing"
"#,
    )
    .unwrap();

    let settings = Settings::load(dir.path()).unwrap();
    assert_eq!(settings.storage_path(dir.path()), dir.path().join("secrets"));

    let config = settings.vault_config().unwrap();
    assert_eq!(config.name(), "prefs");
    assert_eq!(config.encryption_level(), EncryptionLevel::Standard);
    assert_eq!(config.key_alias(), "prefs_key");
    assert_eq!(config.schema_version(), 4);
    assert_eq!(config.cache_duration().map(|d| d.as_secs()), Some(60));
}

#[test]
fn invalid_settings_are_config_errors() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("vaultstore.toml"),
        "encryption_level = \"extreme\"\n",
    )
    .unwrap();
    assert!(matches!(
        Settings::load(dir.path()),
        Err(VaultError::Config(_))
    ));

    fs::write(dir.path().join("vaultstore.toml"), "name = \"a:b\"\n").unwrap();
    let settings = Settings::load(dir.path()).unwrap();
    assert!(matches!(settings.vault_config(), Err(VaultError::Config(_))));
}

// ---------------------------------------------------------------------------
// SQLite audit log
// ---------------------------------------------------------------------------

#[cfg(feature = "audit-log")]
#[tokio::test]
async fn sqlite_audit_log_records_vault_operations() {
    use vaultstore::audit::{SqliteAuditLog, VaultOperation};

    let dir = TempDir::new().unwrap();
    let log = Arc::new(SqliteAuditLog::open(dir.path(), "audited").expect("audit db"));

    let config = VaultConfig::builder()
        .name("audited")
        .encryption_level(EncryptionLevel::None)
        .audit_logger(log.clone())
        .build()
        .unwrap();
    let vault = VaultEngine::open(config, MemoryStore::new()).unwrap();

    vault.put_string("k", "v").await.unwrap();
    vault.remove("k").await.unwrap();

    let entries = log.query(10, None).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].operation, VaultOperation::Remove);
    assert_eq!(entries[1].operation, VaultOperation::Put);
    assert_eq!(entries[1].key_name.as_deref(), Some("k"));
    assert!(entries.iter().all(|e| e.success && e.vault == "audited"));
}
