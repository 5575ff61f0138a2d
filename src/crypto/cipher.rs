//! The cipher capability a vault engine encrypts through.
//!
//! Platform layers may bring their own implementation (for example one
//! backed by a hardware keystore).  The engine only accepts a cipher
//! for the STANDARD/HIGH levels if it reports authenticated encryption;
//! anything weaker is refused at open time instead of silently storing
//! obfuscated data.

use aes_gcm::{Aes128Gcm, Aes256Gcm};

use crate::config::EncryptionLevel;
use crate::errors::Result;

use super::encryption;
use super::keys::DerivedKey;

/// Byte transform between plaintext values and stored frames.
pub trait Cipher: Send + Sync {
    /// Build the cipher around a derived vault key.
    fn from_key(key: DerivedKey) -> Result<Self>
    where
        Self: Sized;

    /// The level this cipher provides.
    fn level(&self) -> EncryptionLevel;

    /// `true` if `decrypt` detects any modification of a frame.
    fn is_authenticated(&self) -> bool;

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    fn decrypt(&self, frame: &[u8]) -> Result<Vec<u8>>;
}

/// AES-GCM cipher keyed once from a zeroize-on-drop [`DerivedKey`].
///
/// The AES key schedule is expanded in `from_key` and reused for every
/// frame; it is wiped when the cipher is dropped.
pub struct AeadCipher {
    keyed: Keyed,
}

enum Keyed {
    None,
    Standard(Aes128Gcm),
    High(Aes256Gcm),
}

impl Cipher for AeadCipher {
    fn from_key(key: DerivedKey) -> Result<Self> {
        let keyed = match key.level() {
            EncryptionLevel::None => Keyed::None,
            EncryptionLevel::Standard => Keyed::Standard(encryption::build(key.as_bytes())?),
            EncryptionLevel::High => Keyed::High(encryption::build(key.as_bytes())?),
        };
        Ok(Self { keyed })
    }

    fn level(&self) -> EncryptionLevel {
        match self.keyed {
            Keyed::None => EncryptionLevel::None,
            Keyed::Standard(_) => EncryptionLevel::Standard,
            Keyed::High(_) => EncryptionLevel::High,
        }
    }

    fn is_authenticated(&self) -> bool {
        !matches!(self.keyed, Keyed::None)
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        match &self.keyed {
            Keyed::None => Ok(plaintext.to_vec()),
            Keyed::Standard(cipher) => encryption::seal_with(cipher, plaintext),
            Keyed::High(cipher) => encryption::seal_with(cipher, plaintext),
        }
    }

    fn decrypt(&self, frame: &[u8]) -> Result<Vec<u8>> {
        match &self.keyed {
            Keyed::None => Ok(frame.to_vec()),
            Keyed::Standard(cipher) => encryption::open_with(cipher, frame),
            Keyed::High(cipher) => encryption::open_with(cipher, frame),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aead_cipher_reports_level_and_authentication() {
        let high = AeadCipher::from_key(
            DerivedKey::from_bytes(vec![1; 32], EncryptionLevel::High).unwrap(),
        )
        .unwrap();
        assert_eq!(high.level(), EncryptionLevel::High);
        assert!(high.is_authenticated());

        let none = AeadCipher::from_key(DerivedKey::none()).unwrap();
        assert_eq!(none.level(), EncryptionLevel::None);
        assert!(!none.is_authenticated());
    }

    #[test]
    fn aead_cipher_roundtrip() {
        let cipher = AeadCipher::from_key(
            DerivedKey::from_bytes(vec![7; 16], EncryptionLevel::Standard).unwrap(),
        )
        .unwrap();
        let frame = cipher.encrypt(b"token").unwrap();
        assert_eq!(cipher.decrypt(&frame).unwrap(), b"token");
    }

    #[test]
    fn keyed_cipher_is_reused_across_frames() {
        let cipher = AeadCipher::from_key(
            DerivedKey::from_bytes(vec![9; 32], EncryptionLevel::High).unwrap(),
        )
        .unwrap();
        let same_key = DerivedKey::from_bytes(vec![9; 32], EncryptionLevel::High).unwrap();

        let frames: Vec<Vec<u8>> = (0..8u8)
            .map(|i| cipher.encrypt(&[i; 4]).unwrap())
            .collect();
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(encryption::decrypt(&same_key, frame).unwrap(), vec![i as u8; 4]);
            assert_eq!(cipher.decrypt(frame).unwrap(), vec![i as u8; 4]);
        }
        assert_ne!(frames[0][..encryption::IV_LEN], frames[1][..encryption::IV_LEN]);
    }
}
