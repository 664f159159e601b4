//! Expiry-driven cleanup.
//!
//! Two independent sweeps run on every call:
//! 1. Backend: private entries whose `expiresAt` is at or before now are
//!    removed. Entries without an expiry are never touched.
//! 2. Cache: records older than the cache TTL are evicted.

use chrono::Utc;

use satchel_core::StorageError;

use crate::backend::StorageBackend;
use crate::plugin_storage::PluginStorage;

/// Counts from one cleanup run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Backend entries removed because their expiry had passed.
    pub expired_entries: usize,
    /// Cache records evicted because their TTL had elapsed.
    pub evicted_cache_records: usize,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.expired_entries + self.evicted_cache_records
    }
}

pub struct CleanupService<'a, B: StorageBackend> {
    storage: &'a PluginStorage<B>,
}

impl<'a, B: StorageBackend> CleanupService<'a, B> {
    pub fn new(storage: &'a PluginStorage<B>) -> Self {
        Self { storage }
    }

    pub async fn run(&self) -> Result<CleanupReport, StorageError> {
        let expired_entries = self.remove_expired_entries().await?;
        let evicted_cache_records = self.storage.cache().sweep_expired();

        let report = CleanupReport {
            expired_entries,
            evicted_cache_records,
        };
        tracing::debug!(
            plugin_id = %self.storage.plugin_id(),
            expired_entries,
            evicted_cache_records,
            "cleanup finished"
        );
        Ok(report)
    }

    async fn remove_expired_entries(&self) -> Result<usize, StorageError> {
        let now = Utc::now();
        let schema = self.storage.schema();
        let all = self
            .storage
            .call(self.storage.backend().get_all())
            .await?;

        let expired: Vec<String> = all
            .into_iter()
            .filter(|(key, entry)| schema.own_logical_key(key).is_some() && entry.is_expired_at(now))
            .map(|(key, _)| key)
            .collect();
        if expired.is_empty() {
            return Ok(0);
        }

        self.storage
            .call(self.storage.backend().remove_many(&expired))
            .await?;
        for key in &expired {
            self.storage.cache().invalidate(key);
        }
        Ok(expired.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::options::StorageOptions;
    use chrono::Duration;
    use satchel_core::Entry;
    use serde_json::json;
    use std::sync::Arc;

    fn expired_entry() -> Entry {
        let now = Utc::now();
        Entry::from_parts(
            json!("old"),
            now - Duration::hours(2),
            Some(now - Duration::hours(1)),
            None,
        )
    }

    #[tokio::test]
    async fn test_removes_only_expired_private_entries() {
        let backend = Arc::new(InMemoryBackend::new());
        let storage = PluginStorage::new("weather", Arc::clone(&backend)).unwrap();
        backend.insert_raw("plugin:weather:past", expired_entry()).await;
        backend.insert_raw("plugin:news:past", expired_entry()).await;
        backend.insert_raw("shared:tabs:past", expired_entry()).await;
        storage
            .set_with(
                "future",
                json!(1),
                crate::SetOptions::new().expires_in(std::time::Duration::from_secs(3600)),
            )
            .await
            .unwrap();
        storage.set("forever", json!(2)).await.unwrap();

        let report = CleanupService::new(&storage).run().await.unwrap();

        assert_eq!(report.expired_entries, 1);
        assert_eq!(report.evicted_cache_records, 0);
        assert_eq!(
            backend.raw_keys().await,
            vec![
                "plugin:news:past".to_string(),
                "plugin:weather:forever".to_string(),
                "plugin:weather:future".to_string(),
                "shared:tabs:past".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_counts_stale_cache_records() {
        let backend = Arc::new(InMemoryBackend::new());
        let options = StorageOptions::new().with_cache_ttl(std::time::Duration::ZERO);
        let storage = PluginStorage::with_options("weather", backend, options).unwrap();
        storage.set("a", json!(1)).await.unwrap();
        storage.set("b", json!(2)).await.unwrap();

        assert_eq!(storage.cleanup().await.unwrap(), 2);
        assert_eq!(storage.cache_stats().entry_count, 0);
        assert_eq!(storage.get("a").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn test_nothing_to_do() {
        let backend = Arc::new(InMemoryBackend::new());
        let storage = PluginStorage::new("weather", Arc::clone(&backend)).unwrap();

        assert_eq!(storage.cleanup().await.unwrap(), 0);
        assert_eq!(backend.write_count(), 0);
    }
}
