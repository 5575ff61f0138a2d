//! The vault engine: typed, encrypted, observable key-value access.
//!
//! `VaultEngine` ties a [`Cipher`] and a [`BackingStore`] together
//! behind a typed API.  Values are converted to their canonical bytes,
//! encrypted, and written under `"{vault}:{key}"`.
//!
//! Every operation runs under the engine's own async mutex and then
//! inside the store's exclusive section for the vault namespace, so
//! operations on one engine are totally ordered.  Notification channels
//! are updated while both are held: an observer never sees a value that
//! was not persisted, and after `clear` every observer sees absence
//! before any later write.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::audit::VaultOperation;
use crate::config::{EncryptionLevel, VaultConfig};
use crate::crypto::kdf::vault_salt;
use crate::crypto::keys::derive_key;
use crate::crypto::{AeadCipher, Cipher};
use crate::errors::{Result, VaultError};
use crate::storage::{BackingStore, ExclusiveAccess};

use super::entry::Entry;
use super::observe::{Observer, Snapshot};
use super::value::{Json, ObjectCodec, VaultValue};

/// Name of the metadata slot holding the recorded schema version.
const SCHEMA_VERSION_SLOT: &str = "schema_version";

/// Mutable per-engine state, guarded by the engine mutex.
#[derive(Default)]
struct EngineState {
    channels: HashMap<String, watch::Sender<Snapshot>>,
}

impl EngineState {
    /// Push a new value to the key's observers, if any.
    fn publish(&self, key: &str, snapshot: Snapshot) {
        if let Some(tx) = self.channels.get(key) {
            tx.send_replace(snapshot);
        }
    }

    /// Like `publish`, but stays quiet when the value is unchanged.
    fn refresh(&self, key: &str, snapshot: &Snapshot) {
        if let Some(tx) = self.channels.get(key) {
            tx.send_if_modified(|current| {
                let changed = current.as_deref().map(|b| b.as_slice())
                    != snapshot.as_deref().map(|b| b.as_slice());
                if changed {
                    current.clone_from(snapshot);
                }
                changed
            });
        }
    }

    fn publish_absent_everywhere(&self) {
        for tx in self.channels.values() {
            tx.send_replace(None);
        }
    }
}

/// An encrypted, typed key-value vault over a backing store.
///
/// The derived key lives inside the cipher and is wiped when the
/// engine is dropped.
pub struct VaultEngine<S, C = AeadCipher> {
    config: VaultConfig,
    store: S,
    cipher: C,
    namespace: String,
    meta_namespace: String,
    state: Mutex<EngineState>,
}

impl<S: BackingStore> VaultEngine<S, AeadCipher> {
    /// Open a vault with the built-in AES-GCM cipher.
    ///
    /// Derives the vault key from the config's alias and name; this runs
    /// Argon2id and is deliberately slow.
    pub fn open(config: VaultConfig, store: S) -> Result<Self> {
        Self::with_derived_key(config, store)
    }
}

impl<S: BackingStore, C: Cipher> VaultEngine<S, C> {
    /// Open a vault, deriving the key and building `C` from it.
    pub fn with_derived_key(config: VaultConfig, store: S) -> Result<Self> {
        let salt = vault_salt(config.name());
        let key = derive_key(
            config.key_alias(),
            config.encryption_level(),
            &salt,
            config.kdf_params(),
        )?;
        let cipher = C::from_key(key)?;
        Self::with_cipher(config, store, cipher)
    }

    /// Open a vault around an already-built cipher.
    ///
    /// Refuses ciphers whose level differs from the config and, for
    /// STANDARD/HIGH, ciphers without authenticated encryption.
    pub fn with_cipher(config: VaultConfig, store: S, cipher: C) -> Result<Self> {
        let level = config.encryption_level();
        if cipher.level() != level {
            return Err(VaultError::Initialization(format!(
                "cipher provides {} but vault '{}' is configured for {level}",
                cipher.level(),
                config.name()
            )));
        }
        if level != EncryptionLevel::None && !cipher.is_authenticated() {
            return Err(VaultError::NonConformantCipher(format!(
                "{level} requires authenticated encryption"
            )));
        }
        if level == EncryptionLevel::None {
            warn!(vault = config.name(), "vault is not encrypted");
        }

        let namespace = format!("{}:", config.name());
        let meta_namespace = format!("{}#meta:", config.name());
        debug!(vault = config.name(), %level, "vault opened");

        Ok(Self {
            config,
            store,
            cipher,
            namespace,
            meta_namespace,
            state: Mutex::new(EngineState::default()),
        })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        self.config.name()
    }

    /// The backing store this engine writes to.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Namespaced storage key for a vault key.
    pub fn storage_key(&self, key: &str) -> String {
        format!("{}{key}", self.namespace)
    }

    // ------------------------------------------------------------------
    // Generic typed operations
    // ------------------------------------------------------------------

    /// Store `value` under `key`.
    ///
    /// Either the encrypted frame is persisted and observers are
    /// notified, or an error is returned and no observer sees the value.
    pub async fn put<T: VaultValue>(&self, key: &str, value: &T) -> Result<()> {
        let result = self.write(key, value).await;
        self.audit(VaultOperation::Put, Some(key), &result);
        result
    }

    /// Read `key` as `T`.
    ///
    /// `Ok(None)` means the key is absent, its value does not parse as
    /// `T`, or the read failed.  A failed read (tampered frame, foreign
    /// key, store error) is still reported to the audit sink as a failed
    /// GET and logged at warn level; it never surfaces as `Err`.
    pub async fn get<T: VaultValue>(&self, key: &str) -> Result<Option<T>> {
        Ok(self.get_verified(key).await.unwrap_or(None))
    }

    /// Like `get`, but a failed read is returned instead of reported as
    /// absent.  Key rotation uses this so corrupt entries stay in place.
    pub(crate) async fn get_verified<T: VaultValue>(&self, key: &str) -> Result<Option<T>> {
        let result = self.read(key).await;
        self.audit(VaultOperation::Get, Some(key), &result);
        Ok(result?.and_then(|plaintext| T::from_canonical(&plaintext)))
    }

    /// Read `key` as `T`, falling back to `default`.
    pub async fn get_or<T: VaultValue>(&self, key: &str, default: T) -> Result<T> {
        Ok(self.get(key).await?.unwrap_or(default))
    }

    /// Delete `key`.  Removing an absent key succeeds.
    pub async fn remove(&self, key: &str) -> Result<()> {
        let result = self.delete(key).await;
        self.audit(VaultOperation::Remove, Some(key), &result);
        result
    }

    /// Delete every key of this vault and reset all observers to absent.
    pub async fn clear(&self) -> Result<()> {
        let result = self.clear_namespace().await;
        self.audit(VaultOperation::Clear, None, &result);
        result
    }

    /// `true` if `key` has a stored value (no decryption performed).
    pub async fn contains(&self, key: &str) -> Result<bool> {
        let result = self.exists(key).await;
        self.audit(VaultOperation::Contains, Some(key), &result);
        result
    }

    /// Every key of this vault, without the namespace prefix.
    pub async fn keys(&self) -> Result<BTreeSet<String>> {
        let result = self.list().await;
        self.audit(VaultOperation::Keys, None, &result);
        result
    }

    /// Subscribe to `key`.
    ///
    /// The observer starts from the key's current stored value and then
    /// follows every put/remove/clear made through this engine.
    pub async fn observe<T: VaultValue>(&self, key: &str) -> Result<Observer<T>> {
        let mut state = self.state.lock().await;

        if let Some(tx) = state.channels.get(key) {
            return Ok(Observer::new(tx.subscribe()));
        }

        let _section = self.enter().await?;
        let initial = self.read_plaintext(key).await?.map(Arc::new);
        let (tx, rx) = watch::channel(initial);
        state.channels.insert(key.to_string(), tx);
        debug!(vault = self.name(), key, "observer channel created");

        Ok(Observer::new(rx))
    }

    // ------------------------------------------------------------------
    // Named typed operations
    // ------------------------------------------------------------------

    pub async fn put_string(&self, key: &str, value: &str) -> Result<()> {
        self.put(key, &value.to_string()).await
    }

    pub async fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.get(key).await
    }

    pub async fn put_int(&self, key: &str, value: i32) -> Result<()> {
        self.put(key, &value).await
    }

    pub async fn get_int(&self, key: &str) -> Result<Option<i32>> {
        self.get(key).await
    }

    pub async fn put_long(&self, key: &str, value: i64) -> Result<()> {
        self.put(key, &value).await
    }

    pub async fn get_long(&self, key: &str) -> Result<Option<i64>> {
        self.get(key).await
    }

    pub async fn put_bool(&self, key: &str, value: bool) -> Result<()> {
        self.put(key, &value).await
    }

    pub async fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.get(key).await
    }

    pub async fn put_float(&self, key: &str, value: f32) -> Result<()> {
        self.put(key, &value).await
    }

    pub async fn get_float(&self, key: &str) -> Result<Option<f32>> {
        self.get(key).await
    }

    pub async fn put_double(&self, key: &str, value: f64) -> Result<()> {
        self.put(key, &value).await
    }

    pub async fn get_double(&self, key: &str) -> Result<Option<f64>> {
        self.get(key).await
    }

    /// Store raw bytes as-is (no string conversion).
    pub async fn put_bytes(&self, key: &str, value: &[u8]) -> Result<()> {
        self.put(key, &value.to_vec()).await
    }

    pub async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.get(key).await
    }

    /// Store a serializable object as JSON.
    pub async fn put_object<T: Serialize + DeserializeOwned>(
        &self,
        key: &str,
        value: T,
    ) -> Result<()> {
        self.put(key, &Json(value)).await
    }

    /// Read a JSON object; `None` if absent or not decodable as `T`.
    pub async fn get_object<T: Serialize + DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        Ok(self.get::<Json<T>>(key).await?.map(Json::into_inner))
    }

    /// Store an object through a caller-supplied codec.
    pub async fn put_object_with<T, K>(&self, key: &str, value: &T, codec: &K) -> Result<()>
    where
        T: Serialize,
        K: ObjectCodec,
    {
        match codec.encode(value) {
            Ok(text) => self.put(key, &text).await,
            Err(e) => {
                let result = Err(e);
                self.audit(VaultOperation::Put, Some(key), &result);
                result
            }
        }
    }

    /// Read an object through a caller-supplied codec.
    ///
    /// Decode failures yield `None`, like every typed getter.
    pub async fn get_object_with<T, K>(&self, key: &str, codec: &K) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        K: ObjectCodec,
    {
        let Some(text) = self.get::<String>(key).await? else {
            return Ok(None);
        };
        Ok(codec.decode(&text).ok())
    }

    // ------------------------------------------------------------------
    // Entries
    // ------------------------------------------------------------------

    /// A typed handle on `key` with no default.
    pub fn entry<T: VaultValue + Clone>(&self, key: &str) -> Entry<'_, S, C, T> {
        Entry::new(self, key, None)
    }

    /// A typed handle on `key` that falls back to `default`.
    pub fn entry_with_default<T: VaultValue + Clone>(
        &self,
        key: &str,
        default: T,
    ) -> Entry<'_, S, C, T> {
        Entry::new(self, key, Some(default))
    }

    pub fn string_entry(&self, key: &str, default: Option<String>) -> Entry<'_, S, C, String> {
        Entry::new(self, key, default)
    }

    pub fn int_entry(&self, key: &str, default: Option<i32>) -> Entry<'_, S, C, i32> {
        Entry::new(self, key, default)
    }

    pub fn long_entry(&self, key: &str, default: Option<i64>) -> Entry<'_, S, C, i64> {
        Entry::new(self, key, default)
    }

    pub fn bool_entry(&self, key: &str, default: Option<bool>) -> Entry<'_, S, C, bool> {
        Entry::new(self, key, default)
    }

    pub fn float_entry(&self, key: &str, default: Option<f32>) -> Entry<'_, S, C, f32> {
        Entry::new(self, key, default)
    }

    pub fn double_entry(&self, key: &str, default: Option<f64>) -> Entry<'_, S, C, f64> {
        Entry::new(self, key, default)
    }

    pub fn bytes_entry(&self, key: &str, default: Option<Vec<u8>>) -> Entry<'_, S, C, Vec<u8>> {
        Entry::new(self, key, default)
    }

    pub fn object_entry<T>(&self, key: &str, default: Option<T>) -> Entry<'_, S, C, Json<T>>
    where
        T: Serialize + DeserializeOwned + Clone,
    {
        Entry::new(self, key, default.map(Json))
    }

    // ------------------------------------------------------------------
    // Schema version
    // ------------------------------------------------------------------

    /// The schema version last recorded for this vault, if any.
    pub async fn recorded_schema_version(&self) -> Result<Option<u32>> {
        let _state = self.state.lock().await;
        let _section = self.enter().await?;
        self.read_schema_version().await
    }

    /// Record `version` as this vault's schema version.
    ///
    /// The recorded version never decreases.
    pub async fn record_schema_version(&self, version: u32) -> Result<()> {
        let _state = self.state.lock().await;
        let _section = self.enter().await?;

        if let Some(current) = self.read_schema_version().await? {
            if version < current {
                return Err(VaultError::Migration(format!(
                    "vault '{}' is at schema version {current}, refusing to record {version}",
                    self.name()
                )));
            }
        }

        let plaintext = Zeroizing::new(version.to_string().into_bytes());
        let frame = self.cipher.encrypt(&plaintext)?;
        self.store.put_bytes(&self.meta_key(), &frame).await?;
        debug!(vault = self.name(), version, "schema version recorded");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn meta_key(&self) -> String {
        format!("{}{SCHEMA_VERSION_SLOT}", self.meta_namespace)
    }

    async fn enter(&self) -> Result<ExclusiveAccess> {
        self.store.exclusive_access(&self.namespace).await
    }

    async fn write<T: VaultValue>(&self, key: &str, value: &T) -> Result<()> {
        let plaintext = Zeroizing::new(value.to_canonical()?);
        let frame = self.cipher.encrypt(&plaintext)?;

        let state = self.state.lock().await;
        let _section = self.enter().await?;
        self.store.put_bytes(&self.storage_key(key), &frame).await?;
        state.publish(key, Some(Arc::new(plaintext)));
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<Arc<Zeroizing<Vec<u8>>>>> {
        let state = self.state.lock().await;
        let _section = self.enter().await?;
        let snapshot = self.read_plaintext(key).await?.map(Arc::new);
        state.refresh(key, &snapshot);
        Ok(snapshot)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let state = self.state.lock().await;
        let _section = self.enter().await?;
        self.store.delete(&self.storage_key(key)).await?;
        state.publish(key, None);
        Ok(())
    }

    async fn clear_namespace(&self) -> Result<()> {
        let state = self.state.lock().await;
        let _section = self.enter().await?;
        if let Err(e) = self.store.clear(&self.namespace).await {
            // The store may have deleted some keys before failing.
            self.resync_observed(&state).await;
            return Err(e);
        }
        state.publish_absent_everywhere();
        Ok(())
    }

    /// Publish `None` to every observed key that is no longer stored.
    /// Caller holds the state lock and section.
    async fn resync_observed(&self, state: &EngineState) {
        let observed: Vec<String> = state.channels.keys().cloned().collect();
        for key in observed {
            if let Ok(None) = self.store.get_bytes(&self.storage_key(&key)).await {
                state.publish(&key, None);
            }
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let _state = self.state.lock().await;
        let _section = self.enter().await?;
        Ok(self
            .store
            .get_bytes(&self.storage_key(key))
            .await?
            .is_some())
    }

    async fn list(&self) -> Result<BTreeSet<String>> {
        let _state = self.state.lock().await;
        let _section = self.enter().await?;
        Ok(self
            .store
            .list_keys(&self.namespace)
            .await?
            .into_iter()
            .filter_map(|k| k.strip_prefix(&self.namespace).map(str::to_string))
            .collect())
    }

    /// Fetch and decrypt `key`.  Caller holds the state lock and section.
    async fn read_plaintext(&self, key: &str) -> Result<Option<Zeroizing<Vec<u8>>>> {
        let Some(frame) = self.store.get_bytes(&self.storage_key(key)).await? else {
            return Ok(None);
        };
        self.cipher.decrypt(&frame).map(|p| Some(Zeroizing::new(p)))
    }

    async fn read_schema_version(&self) -> Result<Option<u32>> {
        let Some(frame) = self.store.get_bytes(&self.meta_key()).await? else {
            return Ok(None);
        };
        let plaintext = Zeroizing::new(self.cipher.decrypt(&frame)?);
        std::str::from_utf8(&plaintext)
            .ok()
            .and_then(|text| text.parse::<u32>().ok())
            .map(Some)
            .ok_or_else(|| {
                VaultError::Migration(format!(
                    "vault '{}' has an unreadable schema version",
                    self.name()
                ))
            })
    }

    fn audit<T>(&self, operation: VaultOperation, key: Option<&str>, result: &Result<T>) {
        let logger = self.config.audit_logger();
        match result {
            Ok(_) => {
                debug!(vault = self.name(), %operation, key, "vault operation");
                logger.log(operation, key, true, None);
            }
            Err(e) => {
                let message = e.to_string();
                warn!(vault = self.name(), %operation, key, error = %message, "vault operation failed");
                logger.log(operation, key, false, Some(&message));
            }
        }
    }
}
