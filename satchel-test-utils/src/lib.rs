//! Satchel Test Utilities
//!
//! Shared test infrastructure for the satchel workspace:
//! - Proptest generators for keys, ids and JSON payloads
//! - Fixtures: storage constructors, canned entries, a recording listener
//! - Custom assertions for satchel error kinds
//! - One-shot tracing setup for tests

pub use satchel_core::{
    ConfigPatch, Entry, PluginConfig, SatchelError, SatchelResult, StorageError, StorageEvent,
    StorageEventKind, Timestamp,
};
pub use satchel_events::StorageListener;
pub use satchel_storage::{InMemoryBackend, PluginStorage, StorageOptions};

use chrono::Utc;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};

// ============================================================================
// TRACING
// ============================================================================

/// Install a fmt subscriber for tests, honouring `RUST_LOG` (default `warn`).
/// Safe to call from every test; once a subscriber is set, later calls are
/// ignored.
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// RECORDING LISTENER
// ============================================================================

/// Listener that keeps every event it receives.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<StorageEvent>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Snapshot of the events received so far.
    pub fn events(&self) -> Vec<StorageEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Event kinds in arrival order.
    pub fn kinds(&self) -> Vec<StorageEventKind> {
        self.events().into_iter().map(|event| event.kind).collect()
    }

    pub fn last(&self) -> Option<StorageEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl StorageListener for RecordingListener {
    fn on_event(&self, event: &StorageEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for satchel inputs.

    use super::*;
    use proptest::prelude::*;

    /// A valid plugin id: non-empty, no separator.
    pub fn arb_plugin_id() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_-]{0,15}"
    }

    /// A valid shared namespace name.
    pub fn arb_shared_namespace() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,11}"
    }

    /// A logical key. May contain the separator; excludes reserved names.
    pub fn arb_logical_key() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_.:-]{1,24}".prop_filter("reserved key", |key| {
            !satchel_core::KeySchema::is_reserved(key)
        })
    }

    /// Arbitrary JSON value of bounded depth and size.
    pub fn arb_json_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            "[ -~]{0,16}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|map| Value::Object(map.into_iter().collect())),
            ]
        })
    }

    /// A timestamp between 2020 and 2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common storage scenarios.

    use super::*;
    use chrono::Duration;

    /// Fresh backend plus storage for `plugin_id` with default options.
    pub fn storage(plugin_id: &str) -> (Arc<InMemoryBackend>, PluginStorage<InMemoryBackend>) {
        storage_with_options(plugin_id, StorageOptions::default())
    }

    pub fn storage_with_options(
        plugin_id: &str,
        options: StorageOptions,
    ) -> (Arc<InMemoryBackend>, PluginStorage<InMemoryBackend>) {
        let backend = Arc::new(InMemoryBackend::new());
        match PluginStorage::with_options(plugin_id, Arc::clone(&backend), options) {
            Ok(storage) => (backend, storage),
            Err(err) => panic!("invalid plugin id {plugin_id:?}: {err}"),
        }
    }

    /// Another storage instance on an existing backend.
    ///
    /// # Panics
    ///
    /// If `plugin_id` is not a valid plugin id.
    pub fn attach(plugin_id: &str, backend: &Arc<InMemoryBackend>) -> PluginStorage<InMemoryBackend> {
        match PluginStorage::new(plugin_id, Arc::clone(backend)) {
            Ok(storage) => storage,
            Err(err) => panic!("invalid plugin id {plugin_id:?}: {err}"),
        }
    }

    /// An entry written two hours ago that expired an hour ago.
    pub fn expired_entry(value: Value) -> Entry {
        let now = Utc::now();
        Entry::from_parts(
            value,
            now - Duration::hours(2),
            Some(now - Duration::hours(1)),
            None,
        )
    }

    /// An entry that expires an hour from now.
    pub fn expiring_entry(value: Value) -> Entry {
        let now = Utc::now();
        Entry::from_parts(value, now, Some(now + Duration::hours(1)), None)
    }

    /// An entry without expiry.
    pub fn durable_entry(value: Value) -> Entry {
        Entry::new(value)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for satchel error kinds and events.

    use super::*;

    /// Assert that a SatchelResult is a storage-kind error.
    #[track_caller]
    pub fn assert_storage_error<T: std::fmt::Debug>(result: &SatchelResult<T>) {
        match result {
            Err(SatchelError::Storage(_)) => {}
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }

    /// Assert that a SatchelResult is a plugin-kind error.
    #[track_caller]
    pub fn assert_plugin_error<T: std::fmt::Debug>(result: &SatchelResult<T>) {
        match result {
            Err(SatchelError::Plugin(_)) => {}
            other => panic!("Expected Plugin error, got: {:?}", other),
        }
    }

    /// Assert that an event reports a failure carrying `message`.
    #[track_caller]
    pub fn assert_failure_event(event: &StorageEvent, kind: StorageEventKind, message: &str) {
        assert_eq!(event.kind, kind, "Wrong event kind");
        assert!(!event.success, "Expected failure event, got: {:?}", event);
        assert_eq!(event.error.as_deref(), Some(message), "Wrong error message");
    }
}
