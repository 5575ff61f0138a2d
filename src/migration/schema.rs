//! Ordered schema-upgrade steps for a vault.
//!
//! A vault records its schema version in a metadata slot next to (but
//! outside) its key namespace.  Applying a set of migrations walks that
//! version forward one step at a time, recording it after each step, so
//! a run that fails halfway resumes from the last completed step.

use std::future::Future;
use std::pin::Pin;

use tracing::{info, warn};

use crate::crypto::{AeadCipher, Cipher};
use crate::errors::{Result, VaultError};
use crate::storage::BackingStore;
use crate::vault::VaultEngine;

/// Future returned by a migration step.
pub type MigrationFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

type MigrateFn<S, C> = Box<dyn for<'a> Fn(&'a VaultEngine<S, C>) -> MigrationFuture<'a> + Send + Sync>;

/// A version transition `from -> to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStep {
    pub from: u32,
    pub to: u32,
}

/// One registered upgrade step.
pub struct VaultMigration<S, C = AeadCipher> {
    step: MigrationStep,
    migrate: MigrateFn<S, C>,
}

impl<S, C> VaultMigration<S, C> {
    pub fn step(&self) -> MigrationStep {
        self.step
    }
}

/// What a call to [`Migrations::apply`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOutcome {
    /// Version the vault was at before the run.
    pub from: u32,
    /// Version recorded when the run finished.
    pub to: u32,
    /// Steps executed, in order.
    pub applied: Vec<MigrationStep>,
}

impl MigrationOutcome {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Collects migration steps and validates them as a set.
pub struct MigrationBuilder<S, C = AeadCipher> {
    steps: Vec<VaultMigration<S, C>>,
}

impl<S, C> Default for MigrationBuilder<S, C> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<S: BackingStore, C: Cipher> MigrationBuilder<S, C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the step `from -> to`.
    ///
    /// ```ignore
    /// builder.add_migration(1, 2, |vault| {
    ///     Box::pin(async move {
    ///         if let Some(old) = vault.get_string("user").await? {
    ///             vault.put_string("username", &old).await?;
    ///             vault.remove("user").await?;
    ///         }
    ///         Ok(())
    ///     })
    /// })
    /// ```
    pub fn add_migration<F>(mut self, from: u32, to: u32, migrate: F) -> Self
    where
        F: for<'a> Fn(&'a VaultEngine<S, C>) -> MigrationFuture<'a> + Send + Sync + 'static,
    {
        self.steps.push(VaultMigration {
            step: MigrationStep { from, to },
            migrate: Box::new(migrate),
        });
        self
    }

    /// Validate and sort the registered steps.
    pub fn build(mut self) -> Result<Migrations<S, C>> {
        for migration in &self.steps {
            let MigrationStep { from, to } = migration.step;
            if to <= from {
                return Err(VaultError::Migration(format!(
                    "step {from} -> {to} does not move the schema version forward"
                )));
            }
        }

        self.steps.sort_by_key(|m| m.step.from);
        if let Some(pair) = self
            .steps
            .windows(2)
            .find(|pair| pair[0].step.from == pair[1].step.from)
        {
            return Err(VaultError::Migration(format!(
                "more than one step starts at version {}",
                pair[0].step.from
            )));
        }

        Ok(Migrations { steps: self.steps })
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// A validated, ascending set of migration steps.
pub struct Migrations<S, C = AeadCipher> {
    steps: Vec<VaultMigration<S, C>>,
}

impl<S: BackingStore, C: Cipher> Migrations<S, C> {
    pub fn builder() -> MigrationBuilder<S, C> {
        MigrationBuilder::new()
    }

    pub fn steps(&self) -> impl Iterator<Item = MigrationStep> + '_ {
        self.steps.iter().map(VaultMigration::step)
    }

    /// Bring `vault` up to its configured schema version.
    ///
    /// A vault with no recorded version is treated as version 1 when it
    /// holds data; an empty one is stamped at the target directly.
    /// Re-running on a current vault does nothing.
    pub async fn apply(&self, vault: &VaultEngine<S, C>) -> Result<MigrationOutcome> {
        let target = vault.config().schema_version();
        let recorded = vault.recorded_schema_version().await?;

        let start = match recorded {
            Some(version) => version,
            None if vault.keys().await?.is_empty() => {
                vault.record_schema_version(target).await?;
                info!(vault = vault.name(), version = target, "new vault stamped");
                return Ok(MigrationOutcome {
                    from: target,
                    to: target,
                    applied: Vec::new(),
                });
            }
            None => 1,
        };

        if start > target {
            warn!(
                vault = vault.name(),
                recorded = start,
                configured = target,
                "vault schema is newer than configured; leaving it untouched"
            );
        }

        let mut current = start;
        let mut applied = Vec::new();

        for migration in &self.steps {
            let step = migration.step;
            if step.from != current || step.to > target {
                continue;
            }

            info!(vault = vault.name(), from = step.from, to = step.to, "applying migration");
            if let Err(e) = (migration.migrate)(vault).await {
                warn!(vault = vault.name(), from = step.from, to = step.to, error = %e, "migration failed");
                return Err(VaultError::Migration(format!(
                    "step {} -> {} on vault '{}': {e}",
                    step.from,
                    step.to,
                    vault.name()
                )));
            }

            vault.record_schema_version(step.to).await?;
            current = step.to;
            applied.push(step);
        }

        if recorded.is_none() && applied.is_empty() {
            vault.record_schema_version(current).await?;
        }

        if current < target {
            warn!(
                vault = vault.name(),
                reached = current,
                configured = target,
                "no migration path to the configured schema version"
            );
        }

        Ok(MigrationOutcome {
            from: start,
            to: current,
            applied,
        })
    }
}
