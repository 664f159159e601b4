//! Error types for satchel operations

use crate::Timestamp;
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

/// Storage layer errors.
///
/// Every variant belongs to the same caller-facing kind: anything that went
/// wrong while reaching or shaping durable state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// The backend rejected a call or reported a host-level error.
    /// Display is the backend's message, untouched.
    #[error("{message}")]
    Backend { message: String },

    #[error("Invalid namespace {namespace:?}: {reason}")]
    InvalidNamespace { namespace: String, reason: String },

    #[error("Serialization failed for {key}: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Expiry {expires_at} is not after write timestamp {timestamp}")]
    InvalidExpiry {
        timestamp: Timestamp,
        expires_at: Timestamp,
    },
}

impl StorageError {
    /// Wrap a backend failure message.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    pub fn serialization(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::Serialization {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

/// Boxed cause carried by [`PluginError`].
pub type ErrorCause = Arc<dyn StdError + Send + Sync + 'static>;

/// Plugin-supplied code failed.
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    #[error("Migration to {version} failed: {source}")]
    MigrationFailed {
        version: String,
        #[source]
        source: ErrorCause,
    },
}

impl PluginError {
    pub fn migration_failed<E>(version: impl Into<String>, cause: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Self::MigrationFailed {
            version: version.into(),
            source: Arc::from(cause.into()),
        }
    }
}

/// Master error type for all satchel errors.
#[derive(Debug, Clone, Error)]
pub enum SatchelError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),
}

impl SatchelError {
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    pub fn is_plugin(&self) -> bool {
        matches!(self, Self::Plugin(_))
    }

    /// The storage error, if this is one.
    pub fn as_storage(&self) -> Option<&StorageError> {
        match self {
            Self::Storage(err) => Some(err),
            Self::Plugin(_) => None,
        }
    }
}

/// Result type alias for satchel operations.
pub type SatchelResult<T> = Result<T, SatchelError>;

// =============================================================================
// TESTS
// =============================================================================
