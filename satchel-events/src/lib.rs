//! Satchel Events - Listener Fan-Out for Storage Operations
//!
//! Every public storage operation reports its outcome exactly once as a
//! [`StorageEvent`]. This crate holds the per-instance registry those
//! events are delivered through.
//!
//! # Key Types
//!
//! - [`EventBus`]: ordered listener registry with panic-isolated `emit`
//! - [`StorageListener`]: the listener seam (closures implement it)
//! - [`ListenerId`]: handle returned on registration, used for removal

mod bus;

pub use bus::{EventBus, ListenerId, StorageListener};

// Re-export core event types for convenience
pub use satchel_core::{StorageEvent, StorageEventKind};
