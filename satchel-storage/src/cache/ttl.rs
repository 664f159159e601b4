//! TTL cache records and the per-instance cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use satchel_core::{Entry, Timestamp};

use super::stats::CacheStats;

/// One cached entry and when it was cached.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    entry: Entry,
    inserted_at: Timestamp,
    ttl: Duration,
}

impl CacheRecord {
    pub fn new(entry: Entry, inserted_at: Timestamp, ttl: Duration) -> Self {
        Self {
            entry,
            inserted_at,
            ttl,
        }
    }

    /// Time since insertion as of `now`; zero if the clock went backwards.
    pub fn age_at(&self, now: Timestamp) -> Duration {
        now.signed_duration_since(self.inserted_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// A record is expired once its age reaches the TTL.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.age_at(now) >= self.ttl
    }
}

/// In-memory TTL cache owned by exactly one storage instance.
///
/// The lock is never held across an await point.
#[derive(Debug)]
pub struct TtlCache {
    enabled: bool,
    default_ttl: Duration,
    records: RwLock<HashMap<String, CacheRecord>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl TtlCache {
    /// Create an enabled cache applying `default_ttl` to every `put`.
    pub fn new(default_ttl: Duration) -> Self {
        Self::build(true, default_ttl)
    }

    /// Create a cache that never stores anything.
    pub fn disabled() -> Self {
        Self::build(false, Duration::ZERO)
    }

    fn build(enabled: bool, default_ttl: Duration) -> Self {
        Self {
            enabled,
            default_ttl,
            records: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up `key`. Expired records miss and are dropped on the spot.
    pub fn get(&self, key: &str) -> Option<Entry> {
        self.get_at(key, Utc::now())
    }

    pub fn get_at(&self, key: &str, now: Timestamp) -> Option<Entry> {
        if !self.enabled {
            return None;
        }

        {
            let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
            match records.get(key) {
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
                Some(record) if !record.is_expired_at(now) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(record.entry.clone());
                }
                Some(_) => {}
            }
        }

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        // Re-check: a concurrent put may have refreshed the record.
        if records.get(key).is_some_and(|record| record.is_expired_at(now)) {
            records.remove(key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Cache `entry` under `key` with the default TTL.
    pub fn put(&self, key: &str, entry: Entry) {
        self.put_with_ttl(key, entry, self.default_ttl);
    }

    pub fn put_with_ttl(&self, key: &str, entry: Entry, ttl: Duration) {
        if !self.enabled {
            return;
        }
        let record = CacheRecord::new(entry, Utc::now(), ttl);
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), record);
    }

    /// Drop `key`. Returns whether a record was present.
    pub fn invalidate(&self, key: &str) -> bool {
        if !self.enabled {
            return false;
        }
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    /// Drop every record. Returns how many were held.
    pub fn clear(&self) -> usize {
        if !self.enabled {
            return 0;
        }
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let count = records.len();
        records.clear();
        count
    }

    /// Remove every expired record and return how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now())
    }

    pub fn sweep_expired_at(&self, now: Timestamp) -> usize {
        if !self.enabled {
            return 0;
        }
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let before = records.len();
        records.retain(|_, record| !record.is_expired_at(now));
        let removed = before - records.len();
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Number of held records, expired or not.
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.len() as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
