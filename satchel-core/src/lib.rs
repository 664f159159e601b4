//! Satchel Core - Data Types for Per-Plugin Storage
//!
//! Pure, I/O-free building blocks shared by the storage engine:
//! - [`KeySchema`]: namespaced backend keys and their parsing
//! - [`Entry`]: the value wrapper persisted under every key
//! - [`PluginConfig`] / [`ConfigPatch`]: configuration record and shallow merge
//! - [`StorageEvent`]: operation-result notifications
//! - [`StatisticsSnapshot`]: aggregate usage numbers
//! - Error taxonomy ([`StorageError`], [`PluginError`], [`SatchelError`])

mod config;
mod entry;
mod error;
mod event;
mod key;
mod stats;

pub use config::{ConfigPatch, PluginConfig, UiPreferences};
pub use entry::Entry;
pub use error::{ErrorCause, PluginError, SatchelError, SatchelResult, StorageError};
pub use event::{StorageEvent, StorageEventKind};
pub use key::{
    KeySchema, Namespace, ParsedKey, CONFIG_KEY, MIGRATION_PREFIX, PLUGIN_TAG, SEPARATOR,
    SHARED_TAG,
};
pub use stats::StatisticsSnapshot;

/// Wall-clock instant used throughout satchel.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
