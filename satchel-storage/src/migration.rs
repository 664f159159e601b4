//! Version-gated data migrations.
//!
//! A migration to version `v` runs at most once per plugin. Completion is
//! recorded as a `true` marker under `__migration__:<v>`, written only after
//! the migrated value itself has been stored. A failing migration leaves no
//! marker, so the next call retries it.
//!
//! Versions are independent: there is no ordering between them and the
//! caller decides the sequence.

use std::error::Error as StdError;
use std::panic::{self, AssertUnwindSafe};

use serde_json::Value;

use satchel_core::{KeySchema, PluginError, SatchelResult, StorageError};

use crate::backend::StorageBackend;
use crate::plugin_storage::{PluginStorage, SetOptions};

/// Logical key holding the data a migration transforms, unless overridden.
pub const DEFAULT_DATA_KEY: &str = "data";

/// What a call to [`MigrationRunner::migrate`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The migration function ran and the marker was written.
    Applied,
    /// The marker was already present; nothing ran.
    AlreadyApplied,
}

impl MigrationOutcome {
    pub fn was_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Runs migrations against one plugin's private namespace.
pub struct MigrationRunner<'a, B: StorageBackend> {
    storage: &'a PluginStorage<B>,
    data_key: String,
}

impl<'a, B: StorageBackend> MigrationRunner<'a, B> {
    pub fn new(storage: &'a PluginStorage<B>) -> Self {
        Self {
            storage,
            data_key: DEFAULT_DATA_KEY.to_string(),
        }
    }

    /// Migrate the value under `key` instead of [`DEFAULT_DATA_KEY`].
    pub fn with_data_key(mut self, key: impl Into<String>) -> Self {
        self.data_key = key.into();
        self
    }

    /// Whether the marker for `version` is present and `true`.
    pub async fn is_migrated(&self, version: &str) -> Result<bool, StorageError> {
        let marker = self
            .storage
            .get(&KeySchema::migration_logical_key(version))
            .await?;
        Ok(marker == Some(Value::Bool(true)))
    }

    /// Run `migration` unless `version` has already been applied.
    ///
    /// The function receives the current value under the data key (`None`
    /// if absent) and returns its replacement, which is written back stamped
    /// with `version`. An error returned by the function, or a panic inside
    /// it, becomes [`PluginError::MigrationFailed`]. Backend failures surface
    /// as storage errors.
    pub async fn migrate<F, E>(&self, version: &str, migration: F) -> SatchelResult<MigrationOutcome>
    where
        F: FnOnce(Option<Value>) -> Result<Value, E>,
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        let plugin_id = self.storage.plugin_id();

        if self.is_migrated(version).await? {
            tracing::debug!(plugin_id = %plugin_id, version, "migration already applied");
            return Ok(MigrationOutcome::AlreadyApplied);
        }

        let current = self.storage.get(&self.data_key).await?;

        let migrated = match panic::catch_unwind(AssertUnwindSafe(|| migration(current))) {
            Ok(Ok(value)) => value,
            Ok(Err(err)) => {
                let err = PluginError::migration_failed(version, err);
                tracing::warn!(plugin_id = %plugin_id, version, error = %err, "migration failed");
                return Err(err.into());
            }
            Err(payload) => {
                let err = PluginError::migration_failed(version, panic_message(payload.as_ref()));
                tracing::warn!(plugin_id = %plugin_id, version, error = %err, "migration panicked");
                return Err(err.into());
            }
        };

        self.storage
            .set_with(
                &self.data_key,
                migrated,
                SetOptions::new().with_version(version),
            )
            .await?;
        self.storage
            .set(&KeySchema::migration_logical_key(version), Value::Bool(true))
            .await?;

        tracing::debug!(plugin_id = %plugin_id, version, data_key = %self.data_key, "migration applied");
        Ok(MigrationOutcome::Applied)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("migration panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("migration panicked: {message}")
    } else {
        "migration panicked".to_string()
    }
}
