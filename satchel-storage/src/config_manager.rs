//! Per-plugin configuration stored under the `__config__` key.

use satchel_core::{ConfigPatch, PluginConfig, StorageError, CONFIG_KEY};

use crate::backend::StorageBackend;
use crate::plugin_storage::PluginStorage;

/// Reads and writes a plugin's [`PluginConfig`].
///
/// All access goes through the owning [`PluginStorage`], so config reads are
/// cached and every call emits the usual storage events.
pub struct ConfigManager<'a, B: StorageBackend> {
    storage: &'a PluginStorage<B>,
}

impl<'a, B: StorageBackend> ConfigManager<'a, B> {
    pub fn new(storage: &'a PluginStorage<B>) -> Self {
        Self { storage }
    }

    /// Current configuration, or the defaults when none is stored.
    /// Never writes.
    pub async fn get_config(&self) -> Result<PluginConfig, StorageError> {
        Ok(self
            .storage
            .get_as::<PluginConfig>(CONFIG_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Merge `patch` over the current configuration and persist the result.
    ///
    /// Last write wins: two concurrent calls may lose one of the updates.
    pub async fn set_config(&self, patch: ConfigPatch) -> Result<PluginConfig, StorageError> {
        let merged = self.get_config().await?.merged(patch);
        self.storage.set_as(CONFIG_KEY, &merged).await?;
        tracing::debug!(plugin_id = %self.storage.plugin_id(), "configuration updated");
        Ok(merged)
    }

    /// Drop the stored configuration so the defaults apply again.
    pub async fn reset_config(&self) -> Result<(), StorageError> {
        self.storage.remove(CONFIG_KEY).await
    }
}
