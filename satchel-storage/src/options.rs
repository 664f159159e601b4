//! Construction options for [`PluginStorage`](crate::PluginStorage).
//!
//! Options can be built in code, deserialized from a host config file, or
//! read from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default TTL applied to every cache record.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Environment variable toggling the cache (`"false"` disables it).
pub const ENV_CACHE_ENABLED: &str = "SATCHEL_CACHE_ENABLED";

/// Environment variable holding the cache TTL in whole seconds.
pub const ENV_CACHE_TTL_SECS: &str = "SATCHEL_CACHE_TTL_SECS";

/// Options recognized at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageOptions {
    /// Mirror entries in the in-memory cache.
    pub cache_enabled: bool,
    /// TTL of every cache record. Serialized as whole seconds.
    #[serde(with = "duration_secs")]
    pub cache_ttl: Duration,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

impl StorageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options with the cache turned off.
    pub fn disabled_cache() -> Self {
        Self::default().with_cache_enabled(false)
    }

    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Load options from environment variables.
    ///
    /// Environment variables:
    /// - `SATCHEL_CACHE_ENABLED`: "true" or "false" (default: true)
    /// - `SATCHEL_CACHE_TTL_SECS`: cache TTL in seconds (default: 300)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load options through an arbitrary variable lookup. Unparseable
    /// values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let cache_enabled = lookup(ENV_CACHE_ENABLED)
            .map(|s| s.trim().to_lowercase() != "false")
            .unwrap_or(true);

        let cache_ttl = lookup(ENV_CACHE_TTL_SECS)
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CACHE_TTL);

        Self {
            cache_enabled,
            cache_ttl,
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let options = StorageOptions::default();
        assert!(options.cache_enabled);
        assert_eq!(options.cache_ttl, DEFAULT_CACHE_TTL);
        assert!(!StorageOptions::disabled_cache().cache_enabled);
    }

    #[test]
    fn test_builder() {
        let options = StorageOptions::new()
            .with_cache_enabled(false)
            .with_cache_ttl(Duration::from_secs(30));
        assert!(!options.cache_enabled);
        assert_eq!(options.cache_ttl, Duration::from_secs(30));
    }

    #[test]
    fn test_from_lookup() {
        let vars = HashMap::from([
            (ENV_CACHE_ENABLED, "FALSE".to_string()),
            (ENV_CACHE_TTL_SECS, "42".to_string()),
        ]);
        let options = StorageOptions::from_lookup(|name| vars.get(name).cloned());
        assert!(!options.cache_enabled);
        assert_eq!(options.cache_ttl, Duration::from_secs(42));
    }

    #[test]
    fn test_from_lookup_falls_back_on_garbage() {
        let vars = HashMap::from([(ENV_CACHE_TTL_SECS, "soon".to_string())]);
        let options = StorageOptions::from_lookup(|name| vars.get(name).cloned());
        assert_eq!(options, StorageOptions::default());
    }

    #[test]
    fn test_serde_shape() {
        let options = StorageOptions::new().with_cache_ttl(Duration::from_secs(90));
        assert_eq!(
            serde_json::to_value(&options).unwrap(),
            json!({"cacheEnabled": true, "cacheTtl": 90})
        );
        let decoded: StorageOptions = serde_json::from_value(json!({"cacheEnabled": false})).unwrap();
        assert!(!decoded.cache_enabled);
        assert_eq!(decoded.cache_ttl, DEFAULT_CACHE_TTL);
    }
}
