//! AES-GCM authenticated encryption, dispatched on encryption level.
//!
//! Each call to `encrypt` generates a fresh random 12-byte IV and
//! prepends it to the ciphertext.  `decrypt` splits the IV back out
//! before decrypting.
//!
//! Layout of a cipher frame:
//!   [ 12-byte IV | ciphertext + 16-byte auth tag ]
//!
//! STANDARD uses AES-128-GCM, HIGH uses AES-256-GCM.  NONE is a plain
//! pass-through and offers no confidentiality or integrity at all.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, Nonce, OsRng};
use aes_gcm::{Aes128Gcm, Aes256Gcm};

use crate::config::EncryptionLevel;
use crate::errors::{Result, VaultError};

use super::keys::DerivedKey;

/// Size of the AES-GCM IV in bytes.
pub const IV_LEN: usize = 12;

/// Size of the AES-GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// One encrypted value as stored: IV followed by ciphertext-with-tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherFrame {
    pub iv: [u8; IV_LEN],
    pub ciphertext: Vec<u8>,
}

impl CipherFrame {
    /// Split raw frame bytes into IV and ciphertext.
    pub fn parse(frame: &[u8]) -> Result<Self> {
        if frame.len() < IV_LEN {
            return Err(VaultError::MalformedFrame {
                len: frame.len(),
                min: IV_LEN,
            });
        }

        let (iv_bytes, ciphertext) = frame.split_at(IV_LEN);
        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(iv_bytes);

        Ok(Self {
            iv,
            ciphertext: ciphertext.to_vec(),
        })
    }

    /// Serialize as `iv || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut output = Vec::with_capacity(IV_LEN + self.ciphertext.len());
        output.extend_from_slice(&self.iv);
        output.extend_from_slice(&self.ciphertext);
        output
    }
}

/// Encrypt `plaintext` with `key` at the key's level.
///
/// Returns the frame bytes (`iv || ciphertext`), or the plaintext
/// unchanged for the NONE level.
pub fn encrypt(key: &DerivedKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    match key.level() {
        EncryptionLevel::None => Ok(plaintext.to_vec()),
        EncryptionLevel::Standard => seal_with(&build::<Aes128Gcm>(key.as_bytes())?, plaintext),
        EncryptionLevel::High => seal_with(&build::<Aes256Gcm>(key.as_bytes())?, plaintext),
    }
}

/// Decrypt a frame produced by `encrypt` with the same key.
///
/// Fails with `MalformedFrame` if the frame is shorter than an IV and
/// with `Authentication` if the tag does not verify.
pub fn decrypt(key: &DerivedKey, frame: &[u8]) -> Result<Vec<u8>> {
    match key.level() {
        EncryptionLevel::None => Ok(frame.to_vec()),
        EncryptionLevel::Standard => open_with(&build::<Aes128Gcm>(key.as_bytes())?, frame),
        EncryptionLevel::High => open_with(&build::<Aes256Gcm>(key.as_bytes())?, frame),
    }
}

/// Key an AES-GCM instance from raw key bytes.
pub(crate) fn build<C: KeyInit>(key: &[u8]) -> Result<C> {
    C::new_from_slice(key).map_err(|e| VaultError::EncryptionFailed(format!("invalid key length: {e}")))
}

/// Seal `plaintext` under a fresh random IV with an already keyed cipher.
pub(crate) fn seal_with<C>(cipher: &C, plaintext: &[u8]) -> Result<Vec<u8>>
where
    C: Aead + AeadCore,
{
    let nonce = C::generate_nonce(&mut OsRng);

    // Encrypt and authenticate the plaintext.
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| VaultError::EncryptionFailed(format!("encryption error: {e}")))?;

    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(&nonce);
    Ok(CipherFrame { iv, ciphertext }.to_bytes())
}

/// Split a frame and verify it with an already keyed cipher.
pub(crate) fn open_with<C>(cipher: &C, frame: &[u8]) -> Result<Vec<u8>>
where
    C: Aead + AeadCore,
{
    let frame = CipherFrame::parse(frame)?;
    let nonce = Nonce::<C>::from_slice(&frame.iv);

    // Decrypt and verify the auth tag.
    cipher
        .decrypt(nonce, frame.ciphertext.as_slice())
        .map_err(|_| VaultError::Authentication)
}
