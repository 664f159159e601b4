//! Backend collaborator trait and the bundled in-memory backend.
//!
//! The host application supplies the durable key-value store. It is shared
//! process-wide by every plugin's [`PluginStorage`](crate::PluginStorage)
//! and is the only source of truth.

use async_trait::async_trait;
use satchel_core::{Entry, StorageError};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// A rejected backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<BackendError> for StorageError {
    fn from(err: BackendError) -> Self {
        StorageError::Backend {
            message: err.message,
        }
    }
}

/// Result type for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// Asynchronous key-value store supplied by the host.
///
/// # Host Error Channel
///
/// Some hosts report failures out of band instead of rejecting the call.
/// Such backends surface the message through [`take_host_error`], which the
/// storage layer drains immediately after every call; a pending message
/// turns an otherwise successful call into a failure.
///
/// [`take_host_error`]: StorageBackend::take_host_error
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Fetch the given keys. Absent keys are simply missing from the map.
    async fn get_many(&self, keys: &[String]) -> BackendResult<HashMap<String, Entry>>;

    /// Fetch every stored key.
    async fn get_all(&self) -> BackendResult<HashMap<String, Entry>>;

    /// Write every entry, replacing existing ones wholesale.
    async fn set_many(&self, entries: HashMap<String, Entry>) -> BackendResult<()>;

    /// Remove the given keys. Missing keys are not an error.
    async fn remove_many(&self, keys: &[String]) -> BackendResult<()>;

    /// Remove everything, across all plugins.
    async fn clear_all(&self) -> BackendResult<()>;

    /// Drain the host-reported error, if any.
    fn take_host_error(&self) -> Option<String> {
        None
    }
}

// ============================================================================
// IN-MEMORY BACKEND
// ============================================================================

#[derive(Debug)]
enum Fault {
    Reject(String),
    HostError(String),
}

/// In-memory backend for tests and hosts without persistence.
///
/// Uses tokio::sync::RwLock for the entries so callers may hold it across
/// awaits. Faults can be queued to exercise failure paths: each queued fault
/// applies to exactly one subsequent call, in order.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    entries: tokio::sync::RwLock<HashMap<String, Entry>>,
    faults: Mutex<VecDeque<Fault>>,
    host_error: Mutex<Option<String>>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call reject with `message`.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.push_fault(Fault::Reject(message.into()));
    }

    /// Make the next call resolve without effect and leave `message` in the
    /// host error channel.
    pub fn raise_host_error(&self, message: impl Into<String>) {
        self.push_fault(Fault::HostError(message.into()));
    }

    /// Number of `get_many`/`get_all` calls served.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of `set_many`/`remove_many`/`clear_all` calls served.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Read an entry without going through fault injection or counters.
    pub async fn raw_entry(&self, key: &str) -> Option<Entry> {
        self.entries.read().await.get(key).cloned()
    }

    /// Store an entry exactly as given, bypassing fault injection.
    pub async fn insert_raw(&self, key: impl Into<String>, entry: Entry) {
        self.entries.write().await.insert(key.into(), entry);
    }

    pub async fn raw_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn push_fault(&self, fault: Fault) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(fault);
    }

    /// Consume the next queued fault. Returns `Ok(true)` when the call should
    /// proceed, `Ok(false)` when it should resolve without effect.
    fn admit(&self) -> BackendResult<bool> {
        let fault = self
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match fault {
            None => Ok(true),
            Some(Fault::Reject(message)) => Err(BackendError::new(message)),
            Some(Fault::HostError(message)) => {
                *self
                    .host_error
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(message);
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn get_many(&self, keys: &[String]) -> BackendResult<HashMap<String, Entry>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if !self.admit()? {
            return Ok(HashMap::new());
        }
        let entries = self.entries.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| entries.get(key).map(|entry| (key.clone(), entry.clone())))
            .collect())
    }

    async fn get_all(&self) -> BackendResult<HashMap<String, Entry>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if !self.admit()? {
            return Ok(HashMap::new());
        }
        Ok(self.entries.read().await.clone())
    }

    async fn set_many(&self, entries: HashMap<String, Entry>) -> BackendResult<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        if self.admit()? {
            self.entries.write().await.extend(entries);
        }
        Ok(())
    }

    async fn remove_many(&self, keys: &[String]) -> BackendResult<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        if self.admit()? {
            let mut entries = self.entries.write().await;
            for key in keys {
                entries.remove(key);
            }
        }
        Ok(())
    }

    async fn clear_all(&self) -> BackendResult<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        if self.admit()? {
            self.entries.write().await.clear();
        }
        Ok(())
    }

    fn take_host_error(&self) -> Option<String> {
        self.host_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn batch(key: &str, value: serde_json::Value) -> HashMap<String, Entry> {
        HashMap::from([(key.to_string(), Entry::new(value))])
    }

    #[tokio::test]
    async fn test_set_get_remove() {
        let backend = InMemoryBackend::new();
        backend.set_many(batch("a", json!(1))).await.unwrap();
        backend.set_many(batch("b", json!(2))).await.unwrap();

        let found = backend
            .get_many(&["a".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["a"].value(), &json!(1));

        backend.remove_many(&["a".to_string()]).await.unwrap();
        assert_eq!(backend.raw_keys().await, vec!["b".to_string()]);

        backend.clear_all().await.unwrap();
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_fail_next_rejects_one_call() {
        let backend = InMemoryBackend::new();
        backend.fail_next("quota exceeded");

        let err = backend.set_many(batch("a", json!(1))).await.unwrap_err();
        assert_eq!(err.message, "quota exceeded");
        assert!(backend.is_empty().await);

        backend.set_many(batch("a", json!(1))).await.unwrap();
        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test]
    async fn test_host_error_is_reported_out_of_band() {
        let backend = InMemoryBackend::new();
        assert!(backend.take_host_error().is_none());

        backend.raise_host_error("extension context invalidated");
        backend.set_many(batch("a", json!(1))).await.unwrap();

        assert!(backend.is_empty().await);
        assert_eq!(
            backend.take_host_error().as_deref(),
            Some("extension context invalidated")
        );
        assert!(backend.take_host_error().is_none());
    }

    #[tokio::test]
    async fn test_counters() {
        let backend = InMemoryBackend::new();
        backend.get_all().await.unwrap();
        backend.get_many(&[]).await.unwrap();
        backend.remove_many(&[]).await.unwrap();
        assert_eq!(backend.read_count(), 2);
        assert_eq!(backend.write_count(), 1);
    }

    #[test]
    fn test_backend_error_converts_verbatim() {
        let err: StorageError = BackendError::new("boom").into();
        assert_eq!(err, StorageError::backend("boom"));
        assert_eq!(err.to_string(), "boom");
    }
}
