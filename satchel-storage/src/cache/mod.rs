//! In-memory TTL mirror of backend entries.
//!
//! The cache is strictly subordinate to the backend: it is keyed by the same
//! backend keys, populated on successful writes and read-throughs, and
//! invalidated on remove/clear. An expired record behaves exactly like an
//! absent one.
//!
//! # Disabled Mode
//!
//! A cache built with [`TtlCache::disabled`] ignores every write and always
//! misses, which is indistinguishable from a cache that was never populated.

pub mod stats;
pub mod ttl;

pub use stats::CacheStats;
pub use ttl::{CacheRecord, TtlCache};
