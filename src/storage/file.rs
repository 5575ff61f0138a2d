//! File-per-key backing store.
//!
//! Every namespaced key becomes one file in the store directory:
//!
//! ```text
//! <root>/<base64url(namespaced key)>.vault
//! ```
//!
//! Writes go to a temp file in the same directory and are renamed over
//! the target, so readers never see a half-written frame.  On Unix the
//! directory is created `0700` and files are written `0600`.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64;
use base64::Engine;
use tokio::fs;

use super::{BackingStore, ExclusiveAccess, NamespaceLocks};
use crate::errors::{Result, VaultError};

/// Extension of every entry file.
const EXTENSION: &str = "vault";

#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    locks: NamespaceLocks,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| VaultError::storage("open", &root.display().to_string(), e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            fs::set_permissions(&root, perms)
                .await
                .map_err(|e| VaultError::storage("open", &root.display().to_string(), e))?;
        }

        Ok(Self {
            root,
            locks: NamespaceLocks::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `key`.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{EXTENSION}", BASE64.encode(key.as_bytes())))
    }

    /// Decode an entry file name back to its key; `None` for foreign files.
    fn key_from_file_name(name: &str) -> Option<String> {
        let stem = name.strip_suffix(EXTENSION)?.strip_suffix('.')?;
        let bytes = BASE64.decode(stem).ok()?;
        String::from_utf8(bytes).ok()
    }

    async fn entry_keys(&self) -> Result<Vec<String>> {
        let list_err =
            |e: std::io::Error| VaultError::storage("list", &self.root.display().to_string(), e);

        let mut dir = fs::read_dir(&self.root).await.map_err(list_err)?;
        let mut keys = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(list_err)? {
            if let Some(key) = entry
                .file_name()
                .to_str()
                .and_then(Self::key_from_file_name)
            {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl BackingStore for FileStore {
    async fn put_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.entry_path(key);

        // Atomic write: write to a temp file, then rename.
        let tmp_path = self.root.join(format!(
            ".{}.tmp",
            path.file_name().unwrap_or_default().to_string_lossy()
        ));

        fs::write(&tmp_path, bytes)
            .await
            .map_err(|e| VaultError::storage("write", key, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            fs::set_permissions(&tmp_path, perms)
                .await
                .map_err(|e| VaultError::storage("write", key, e))?;
        }

        fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| VaultError::storage("write", key, e))
    }

    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.entry_path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(VaultError::storage("read", key, e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.entry_path(key)).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(VaultError::storage("delete", key, e)),
            _ => Ok(()),
        }
    }

    async fn list_keys(&self, namespace: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .entry_keys()
            .await?
            .into_iter()
            .filter(|k| k.starts_with(namespace))
            .collect())
    }

    async fn clear(&self, namespace: &str) -> Result<()> {
        for key in self.list_keys(namespace).await? {
            self.delete(&key).await?;
        }
        Ok(())
    }

    async fn exclusive_access(&self, namespace: &str) -> Result<ExclusiveAccess> {
        Ok(self.locks.acquire(namespace).await)
    }
}
