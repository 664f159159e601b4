//! Cache usage counters.

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses, including expired records.
    pub misses: u64,
    /// Number of records currently held (expired or not).
    pub entry_count: u64,
    /// Number of records dropped because their TTL elapsed.
    pub evictions: u64,
}

impl CacheStats {
    /// Share of lookups served from the cache, 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        match self.hits + self.misses {
            0 => 0.0,
            lookups => self.hits as f64 / lookups as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlCache;
    use chrono::Utc;
    use satchel_core::Entry;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_counters_track_cache_activity() {
        let cache = TtlCache::new(Duration::from_secs(60));
        assert_eq!(cache.stats().hit_rate(), 0.0);

        cache.put("plugin:weather:a", Entry::new(json!(1)));
        cache.put("plugin:weather:b", Entry::new(json!(2)));
        assert!(cache.get("plugin:weather:a").is_some());
        assert!(cache.get("plugin:weather:b").is_some());
        assert!(cache.get("plugin:weather:missing").is_none());

        let later = Utc::now() + chrono::Duration::seconds(120);
        assert_eq!(cache.sweep_expired_at(later), 2);
        assert!(cache.get("plugin:weather:a").is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.evictions, 2);
        assert_eq!(stats.entry_count, 0);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }
}
