//! Satchel Storage - per-plugin namespaced storage
//!
//! Layers four capabilities over a host-supplied async key-value backend:
//! - A TTL cache that avoids redundant backend round-trips
//! - Idempotent, version-gated data migrations
//! - Usage statistics computed from durable state
//! - Expiry-driven cleanup, with an event for every operation
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use satchel_storage::{InMemoryBackend, PluginStorage};
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), satchel_core::StorageError> {
//! let backend = Arc::new(InMemoryBackend::new());
//! let storage = PluginStorage::new("weather", backend)?;
//! storage.set("city", json!("Oslo")).await?;
//! assert_eq!(storage.get("city").await?, Some(json!("Oslo")));
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod cache;
pub mod cleanup;
pub mod config_manager;
pub mod migration;
pub mod options;
pub mod plugin_storage;
pub mod statistics;

pub use backend::{BackendError, BackendResult, InMemoryBackend, StorageBackend};
pub use cache::{CacheRecord, CacheStats, TtlCache};
pub use cleanup::{CleanupReport, CleanupService};
pub use config_manager::ConfigManager;
pub use migration::{MigrationOutcome, MigrationRunner, DEFAULT_DATA_KEY};
pub use options::{StorageOptions, DEFAULT_CACHE_TTL, ENV_CACHE_ENABLED, ENV_CACHE_TTL_SECS};
pub use plugin_storage::{PluginStorage, SetOptions};
pub use statistics::StatisticsCollector;

pub use satchel_events::{ListenerId, StorageListener};
