//! Per-plugin storage: cache + backend + event bus.
//!
//! One [`PluginStorage`] exists per plugin. It owns its cache and listener
//! list exclusively; only the backend is shared between instances.
//!
//! # Consistency
//!
//! - Every successful private write updates the cache before the call
//!   returns, so a caller always observes its own prior writes.
//! - Remove and clear invalidate cache records whether or not the backend
//!   call succeeded; the cache never outlives doubt about the backend.
//! - Shared-namespace reads always go to the backend, since other plugin
//!   instances write there without touching this instance's cache.
//! - Entries whose `expiresAt` has passed read as absent. Only
//!   [`cleanup`](PluginStorage::cleanup) physically removes them.
//!
//! # Locking
//!
//! No lock coordinates operations; the backend is the only serialization
//! point. The cache, the listener list and the touched-namespace set sit
//! behind short-lived `std` locks purely for interior mutability through
//! `&self`. None of them is ever held across an `.await`.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use satchel_core::{
    ConfigPatch, Entry, KeySchema, Namespace, PluginConfig, SatchelResult, StatisticsSnapshot,
    StorageError, StorageEvent, StorageEventKind, Timestamp,
};
use satchel_events::{EventBus, ListenerId, StorageListener};

use crate::backend::{BackendResult, StorageBackend};
use crate::cache::{CacheStats, TtlCache};
use crate::cleanup::CleanupService;
use crate::config_manager::ConfigManager;
use crate::migration::{MigrationOutcome, MigrationRunner};
use crate::options::StorageOptions;
use crate::statistics::StatisticsCollector;

// ============================================================================
// WRITE OPTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expiry {
    At(Timestamp),
    In(Duration),
}

/// Per-write options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    expiry: Option<Expiry>,
    version: Option<String>,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire at an absolute instant, which must lie in the future.
    pub fn expires_at(mut self, at: Timestamp) -> Self {
        self.expiry = Some(Expiry::At(at));
        self
    }

    /// Expire `ttl` after the write. A zero TTL is rejected.
    pub fn expires_in(mut self, ttl: Duration) -> Self {
        self.expiry = Some(Expiry::In(ttl));
        self
    }

    /// Stamp the entry with a data version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Build the entry for a write happening at `now`.
    fn into_entry(self, value: Value, now: Timestamp) -> Result<Entry, StorageError> {
        let mut entry = Entry::at(value, now);
        if let Some(version) = self.version {
            entry = entry.with_version(version);
        }
        match self.expiry {
            None => Ok(entry),
            Some(Expiry::At(at)) => entry.with_expiry(at),
            Some(Expiry::In(ttl)) => {
                let at = chrono::Duration::from_std(ttl)
                    .ok()
                    .and_then(|ttl| now.checked_add_signed(ttl))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                entry.with_expiry(at)
            }
        }
    }
}

// ============================================================================
// PLUGIN STORAGE
// ============================================================================

/// Namespaced storage for one plugin.
pub struct PluginStorage<B: StorageBackend> {
    schema: KeySchema,
    backend: Arc<B>,
    cache: TtlCache,
    events: EventBus,
    touched_shared: RwLock<BTreeSet<String>>,
    options: StorageOptions,
}

impl<B: StorageBackend> PluginStorage<B> {
    /// Create storage for `plugin_id` with default options.
    pub fn new(plugin_id: impl Into<String>, backend: Arc<B>) -> Result<Self, StorageError> {
        Self::with_options(plugin_id, backend, StorageOptions::default())
    }

    /// Create storage for `plugin_id`.
    ///
    /// Fails with [`StorageError::InvalidNamespace`] when the id is empty or
    /// contains the key separator.
    pub fn with_options(
        plugin_id: impl Into<String>,
        backend: Arc<B>,
        options: StorageOptions,
    ) -> Result<Self, StorageError> {
        let schema = KeySchema::new(plugin_id)?;
        let cache = if options.cache_enabled {
            TtlCache::new(options.cache_ttl)
        } else {
            TtlCache::disabled()
        };
        Ok(Self {
            schema,
            backend,
            cache,
            events: EventBus::new(),
            touched_shared: RwLock::new(BTreeSet::new()),
            options,
        })
    }

    pub fn plugin_id(&self) -> &str {
        self.schema.plugin_id()
    }

    pub fn schema(&self) -> &KeySchema {
        &self.schema
    }

    pub fn options(&self) -> &StorageOptions {
        &self.options
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub(crate) fn cache(&self) -> &TtlCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Shared namespaces this instance has read or written, sorted.
    pub fn touched_shared_namespaces(&self) -> Vec<String> {
        self.touched_shared
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    pub fn add_event_listener(&self, listener: Arc<dyn StorageListener>) -> ListenerId {
        self.events.add_listener(listener)
    }

    /// Unregister a listener. Unknown ids are ignored.
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.events.remove_listener(id)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // ------------------------------------------------------------------------
    // Private namespace
    // ------------------------------------------------------------------------

    /// Read `key`, returning `None` if it is absent or expired.
    pub async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let outcome = self.read_private(key).await;
        self.emit(StorageEventKind::Get, self.schema.namespace(), Some(key), &outcome);
        outcome
    }

    /// Whether `key` currently holds a readable value.
    pub async fn has(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.get(key).await?.is_some())
    }

    /// Read `key` and deserialize it into `T`.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.get(key).await? {
            None => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|err| StorageError::serialization(key, err)),
        }
    }

    pub async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.set_with(key, value, SetOptions::default()).await
    }

    pub async fn set_with(
        &self,
        key: &str,
        value: Value,
        options: SetOptions,
    ) -> Result<(), StorageError> {
        let backend_key = self.schema.private_key(key);
        let outcome = self.write(&backend_key, value, options, true).await;
        self.emit(StorageEventKind::Set, self.schema.namespace(), Some(key), &outcome);
        outcome
    }

    /// Serialize `value` and store it under `key`.
    pub async fn set_as<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), StorageError> {
        let value =
            serde_json::to_value(value).map_err(|err| StorageError::serialization(key, err))?;
        self.set(key, value).await
    }

    pub async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let backend_key = self.schema.private_key(key);
        let outcome = self.delete(&backend_key, true).await;
        self.emit(StorageEventKind::Remove, self.schema.namespace(), Some(key), &outcome);
        outcome
    }

    /// Remove every entry in this plugin's private namespace, including its
    /// configuration and migration markers. Shared data is untouched.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let outcome = self.clear_private().await;
        self.cache.clear();
        self.emit(StorageEventKind::Clear, self.schema.namespace(), None, &outcome);
        outcome.map(|removed| {
            tracing::debug!(plugin_id = %self.plugin_id(), removed, "cleared private namespace");
        })
    }

    /// Logical keys in this plugin's private namespace, sorted.
    pub async fn keys(&self) -> Result<Vec<String>, StorageError> {
        let all = self.call(self.backend.get_all()).await?;
        let keys: BTreeSet<String> = all
            .keys()
            .filter_map(|key| self.schema.own_logical_key(key))
            .map(str::to_string)
            .collect();
        Ok(keys.into_iter().collect())
    }

    // ------------------------------------------------------------------------
    // Shared namespace
    // ------------------------------------------------------------------------

    pub async fn get_shared(&self, shared: &str, key: &str) -> Result<Option<Value>, StorageError> {
        let outcome = self.read_shared(shared, key).await;
        self.emit(
            StorageEventKind::Get,
            &Namespace::Shared(shared.to_string()),
            Some(key),
            &outcome,
        );
        outcome
    }

    pub async fn set_shared(&self, shared: &str, key: &str, value: Value) -> Result<(), StorageError> {
        self.set_shared_with(shared, key, value, SetOptions::default())
            .await
    }

    pub async fn set_shared_with(
        &self,
        shared: &str,
        key: &str,
        value: Value,
        options: SetOptions,
    ) -> Result<(), StorageError> {
        let outcome = match self.shared_key(shared, key) {
            Ok(backend_key) => self.write(&backend_key, value, options, false).await,
            Err(err) => Err(err),
        };
        self.emit(
            StorageEventKind::Set,
            &Namespace::Shared(shared.to_string()),
            Some(key),
            &outcome,
        );
        outcome
    }

    pub async fn remove_shared(&self, shared: &str, key: &str) -> Result<(), StorageError> {
        let outcome = match self.shared_key(shared, key) {
            Ok(backend_key) => self.delete(&backend_key, false).await,
            Err(err) => Err(err),
        };
        self.emit(
            StorageEventKind::Remove,
            &Namespace::Shared(shared.to_string()),
            Some(key),
            &outcome,
        );
        outcome
    }

    // ------------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------------

    pub fn config(&self) -> ConfigManager<'_, B> {
        ConfigManager::new(self)
    }

    pub async fn get_config(&self) -> Result<PluginConfig, StorageError> {
        self.config().get_config().await
    }

    pub async fn set_config(&self, patch: ConfigPatch) -> Result<PluginConfig, StorageError> {
        self.config().set_config(patch).await
    }

    pub fn migrations(&self) -> MigrationRunner<'_, B> {
        MigrationRunner::new(self)
    }

    /// Run `migration` against the default data key unless `version` has
    /// already been applied.
    pub async fn migrate<F, E>(&self, version: &str, migration: F) -> SatchelResult<MigrationOutcome>
    where
        F: FnOnce(Option<Value>) -> Result<Value, E>,
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        self.migrations().migrate(version, migration).await
    }

    pub async fn get_statistics(&self) -> Result<StatisticsSnapshot, StorageError> {
        StatisticsCollector::new(self).collect().await
    }

    /// Remove expired entries and evict stale cache records. Returns the
    /// combined count.
    pub async fn cleanup(&self) -> Result<usize, StorageError> {
        Ok(CleanupService::new(self).run().await?.total())
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Await a backend call, then drain the host error channel. A rejected
    /// call and a pending host error both become [`StorageError::Backend`].
    pub(crate) async fn call<T, Fut>(&self, call: Fut) -> Result<T, StorageError>
    where
        Fut: Future<Output = BackendResult<T>>,
    {
        let result = call.await;
        let host_error = self.backend.take_host_error();
        match (result, host_error) {
            (Err(err), _) => {
                tracing::warn!(plugin_id = %self.plugin_id(), error = %err, "backend call rejected");
                Err(err.into())
            }
            (Ok(_), Some(message)) => {
                tracing::warn!(plugin_id = %self.plugin_id(), error = %message, "backend reported host error");
                Err(StorageError::backend(message))
            }
            (Ok(value), None) => Ok(value),
        }
    }

    async fn fetch(&self, backend_key: &str) -> Result<Option<Entry>, StorageError> {
        let keys = [backend_key.to_string()];
        let mut found = self.call(self.backend.get_many(&keys)).await?;
        Ok(found.remove(backend_key))
    }

    async fn read_private(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let backend_key = self.schema.private_key(key);
        let now = Utc::now();

        if let Some(entry) = self.cache.get(&backend_key) {
            if entry.is_expired_at(now) {
                self.cache.invalidate(&backend_key);
                return Ok(None);
            }
            tracing::debug!(plugin_id = %self.plugin_id(), key, "cache hit");
            return Ok(Some(entry.into_value()));
        }

        match self.fetch(&backend_key).await? {
            Some(entry) if !entry.is_expired_at(now) => {
                self.cache.put(&backend_key, entry.clone());
                Ok(Some(entry.into_value()))
            }
            _ => Ok(None),
        }
    }

    async fn read_shared(&self, shared: &str, key: &str) -> Result<Option<Value>, StorageError> {
        let backend_key = self.shared_key(shared, key)?;
        let entry = self.fetch(&backend_key).await?;
        Ok(entry
            .filter(|entry| !entry.is_expired_at(Utc::now()))
            .map(Entry::into_value))
    }

    async fn write(
        &self,
        backend_key: &str,
        value: Value,
        options: SetOptions,
        cached: bool,
    ) -> Result<(), StorageError> {
        let entry = options.into_entry(value, Utc::now())?;
        let batch = HashMap::from([(backend_key.to_string(), entry.clone())]);
        match self.call(self.backend.set_many(batch)).await {
            Ok(()) => {
                if cached {
                    self.cache.put(backend_key, entry);
                }
                Ok(())
            }
            Err(err) => {
                self.cache.invalidate(backend_key);
                Err(err)
            }
        }
    }

    async fn delete(&self, backend_key: &str, cached: bool) -> Result<(), StorageError> {
        let keys = [backend_key.to_string()];
        let outcome = self.call(self.backend.remove_many(&keys)).await;
        if cached {
            self.cache.invalidate(backend_key);
        }
        outcome
    }

    async fn clear_private(&self) -> Result<usize, StorageError> {
        let all = self.call(self.backend.get_all()).await?;
        let keys: Vec<String> = all
            .into_keys()
            .filter(|key| self.schema.own_logical_key(key).is_some())
            .collect();
        if !keys.is_empty() {
            self.call(self.backend.remove_many(&keys)).await?;
        }
        Ok(keys.len())
    }

    fn shared_key(&self, shared: &str, key: &str) -> Result<String, StorageError> {
        let namespace = KeySchema::shared_namespace(shared)?;
        self.touched_shared
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(shared.to_string());
        Ok(namespace.key(key))
    }

    fn emit<T>(
        &self,
        kind: StorageEventKind,
        namespace: &Namespace,
        key: Option<&str>,
        outcome: &Result<T, StorageError>,
    ) {
        let event = StorageEvent::from_outcome(kind, self.plugin_id(), namespace, key, outcome);
        self.events.emit(&event);
    }
}

impl<B: StorageBackend> fmt::Debug for PluginStorage<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginStorage")
            .field("plugin_id", &self.plugin_id())
            .field("options", &self.options)
            .field("cache_records", &self.cache.len())
            .field("events", &self.events)
            .finish()
    }
}
