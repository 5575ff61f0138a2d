//! Vault module: the encrypted, typed key-value engine.
//!
//! This module provides:
//! - `VaultEngine`, the namespaced encrypted store (`engine`)
//! - `Entry` handles bound to one key and type (`entry`)
//! - `Observer` streams of a key's value (`observe`)
//! - Canonical value encodings and object codecs (`value`)

pub mod engine;
pub mod entry;
pub mod observe;
pub mod value;

// Re-export the most commonly used items.
pub use engine::VaultEngine;
pub use entry::Entry;
pub use observe::Observer;
pub use value::{Json, JsonCodec, ObjectCodec, VaultValue};
