//! Canonical encodings for the value types a vault stores.
//!
//! Numbers and booleans are stored as their decimal / `true`/`false`
//! string form before encryption, strings as UTF-8, raw bytes as-is and
//! objects as serializer output.  Because the string form is shared,
//! a value written as one type can be read back as another:
//! `put_int("n", 42)` followed by `get_string("n")` returns `"42"`.
//!
//! Decoding is lenient: bytes that do not parse as the requested type
//! decode to `None` rather than an error.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{Result, VaultError};

/// A type the vault can store.
pub trait VaultValue: Sized {
    /// Canonical plaintext bytes for this value.
    fn to_canonical(&self) -> Result<Vec<u8>>;

    /// Parse canonical bytes, or `None` if they are not this type.
    fn from_canonical(bytes: &[u8]) -> Option<Self>;
}

impl VaultValue for String {
    fn to_canonical(&self) -> Result<Vec<u8>> {
        Ok(self.as_bytes().to_vec())
    }

    fn from_canonical(bytes: &[u8]) -> Option<Self> {
        String::from_utf8(bytes.to_vec()).ok()
    }
}

impl VaultValue for Vec<u8> {
    fn to_canonical(&self) -> Result<Vec<u8>> {
        Ok(self.clone())
    }

    fn from_canonical(bytes: &[u8]) -> Option<Self> {
        Some(bytes.to_vec())
    }
}

/// Values stored through their `Display` form and read back with `FromStr`.
macro_rules! string_form_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl VaultValue for $ty {
                fn to_canonical(&self) -> Result<Vec<u8>> {
                    Ok(self.to_string().into_bytes())
                }

                fn from_canonical(bytes: &[u8]) -> Option<Self> {
                    std::str::from_utf8(bytes).ok()?.parse().ok()
                }
            }
        )*
    };
}

string_form_value!(i32, i64, bool, f32, f64);

/// Pluggable serializer for structured values.
pub trait ObjectCodec: Send + Sync {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String>;

    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T>;
}

/// JSON via `serde_json` (the default object codec).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl ObjectCodec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String> {
        serde_json::to_string(value).map_err(|e| VaultError::Serialization(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T> {
        serde_json::from_str(text).map_err(|e| VaultError::Serialization(e.to_string()))
    }
}

/// A structured value stored as JSON.
///
/// Lets objects flow through the generic `put`/`get`/`observe`/`entry`
/// API like any scalar.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Serialize + DeserializeOwned> VaultValue for Json<T> {
    fn to_canonical(&self) -> Result<Vec<u8>> {
        JsonCodec.encode(&self.0).map(String::into_bytes)
    }

    fn from_canonical(bytes: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(bytes).ok()?;
        JsonCodec.decode(text).ok().map(Json)
    }
}
