pub mod audit;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod migration;
pub mod storage;
pub mod vault;

pub use config::{EncryptionLevel, VaultConfig};
pub use errors::{Result, VaultError};
pub use storage::{BackingStore, FileStore, MemoryStore};
pub use vault::{Entry, Observer, VaultEngine};
