//! Migration module: schema upgrades and key rotation.
//!
//! This module provides:
//! - `Migrations`, a validated registry of ordered upgrade steps (`schema`)
//! - `rotate_key` / `rotate_all`, per-key re-encryption between vaults (`rotation`)

pub mod rotation;
pub mod schema;

pub use rotation::{rotate_all, rotate_key, RotationFailure, RotationReport};
pub use schema::{
    MigrationBuilder, MigrationFuture, MigrationOutcome, MigrationStep, Migrations, VaultMigration,
};
