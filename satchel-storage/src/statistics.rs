//! Usage statistics computed from durable state.

use satchel_core::{KeySchema, Namespace, StatisticsSnapshot, StorageError};

use crate::backend::StorageBackend;
use crate::plugin_storage::PluginStorage;

/// Aggregates a plugin's backend entries into a [`StatisticsSnapshot`].
///
/// Reads the backend directly and never the cache. Entries past their
/// expiry are still counted until cleanup removes them.
pub struct StatisticsCollector<'a, B: StorageBackend> {
    storage: &'a PluginStorage<B>,
}

impl<'a, B: StorageBackend> StatisticsCollector<'a, B> {
    pub fn new(storage: &'a PluginStorage<B>) -> Self {
        Self { storage }
    }

    /// Count entries in the private namespace (label `"plugin"`) and in every
    /// shared namespace this instance has touched (label `"shared:<name>"`).
    pub async fn collect(&self) -> Result<StatisticsSnapshot, StorageError> {
        let touched = self.storage.touched_shared_namespaces();
        let all = self
            .storage
            .call(self.storage.backend().get_all())
            .await?;

        let mut snapshot = StatisticsSnapshot::default();
        for (key, entry) in &all {
            let Some(parsed) = KeySchema::parse(key) else {
                continue;
            };
            let counted = match &parsed.namespace {
                Namespace::Plugin(owner) => owner == self.storage.plugin_id(),
                Namespace::Shared(name) => touched.contains(name),
            };
            if counted {
                let size = (key.len() + entry.approximate_size()) as u64;
                snapshot.record(&parsed.namespace.label(), size, entry.timestamp());
            }
        }

        tracing::debug!(
            plugin_id = %self.storage.plugin_id(),
            total_entries = snapshot.total_entries,
            total_size = snapshot.total_size,
            "collected storage statistics"
        );
        Ok(snapshot)
    }
}
