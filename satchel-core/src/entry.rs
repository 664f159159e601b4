//! The value wrapper persisted under every logical key.

use crate::{StorageError, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored value plus its write metadata.
///
/// Entries are replaced wholesale on every write; nothing mutates one after
/// it has been built. Callers only ever see clones of the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    value: Value,
    timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

impl Entry {
    /// Create an entry stamped with the current time.
    pub fn new(value: Value) -> Self {
        Self::at(value, Utc::now())
    }

    /// Create an entry stamped with an explicit write time.
    pub fn at(value: Value, timestamp: Timestamp) -> Self {
        Self {
            value,
            timestamp,
            expires_at: None,
            version: None,
        }
    }

    /// Rebuild an entry exactly as it was persisted.
    ///
    /// No invariant is checked: a persisted entry may legitimately carry an
    /// expiry that has passed since it was written.
    pub fn from_parts(
        value: Value,
        timestamp: Timestamp,
        expires_at: Option<Timestamp>,
        version: Option<String>,
    ) -> Self {
        Self {
            value,
            timestamp,
            expires_at,
            version,
        }
    }

    /// Attach an expiry, which must be strictly after the write timestamp.
    pub fn with_expiry(mut self, expires_at: Timestamp) -> Result<Self, StorageError> {
        if expires_at <= self.timestamp {
            return Err(StorageError::InvalidExpiry {
                timestamp: self.timestamp,
                expires_at,
            });
        }
        self.expires_at = Some(expires_at);
        Ok(self)
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn expires_at(&self) -> Option<Timestamp> {
        self.expires_at
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// True once `now` has reached the expiry. Entries without an expiry
    /// never expire.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Approximate persisted size in bytes (JSON encoding of the entry).
    pub fn approximate_size(&self) -> usize {
        serde_json::to_vec(self).map(|bytes| bytes.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_new_entry_has_no_expiry() {
        let entry = Entry::new(json!({"a": 1}));
        assert_eq!(entry.value(), &json!({"a": 1}));
        assert!(entry.expires_at().is_none());
        assert!(entry.version().is_none());
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_expiry_must_be_after_timestamp() {
        let now = Utc::now();
        let entry = Entry::at(json!(1), now);
        assert!(entry.clone().with_expiry(now).is_err());
        assert!(entry.clone().with_expiry(now - Duration::seconds(1)).is_err());

        let expiring = entry.with_expiry(now + Duration::seconds(1)).unwrap();
        assert_eq!(expiring.expires_at(), Some(now + Duration::seconds(1)));
    }

    #[test]
    fn test_is_expired_at_boundary() {
        let now = Utc::now();
        let entry = Entry::at(json!("x"), now)
            .with_expiry(now + Duration::seconds(10))
            .unwrap();
        assert!(!entry.is_expired_at(now + Duration::seconds(9)));
        assert!(entry.is_expired_at(now + Duration::seconds(10)));
        assert!(entry.is_expired_at(now + Duration::seconds(11)));
    }

    #[test]
    fn test_from_parts_allows_past_expiry() {
        let now = Utc::now();
        let entry = Entry::from_parts(json!(true), now, Some(now - Duration::hours(1)), None);
        assert!(entry.is_expired());
    }

    #[test]
    fn test_serialized_shape() {
        let now = Utc::now();
        let entry = Entry::at(json!([1, 2]), now).with_version("1.2.0");
        let encoded = serde_json::to_value(&entry).unwrap();
        assert_eq!(encoded["value"], json!([1, 2]));
        assert_eq!(encoded["version"], json!("1.2.0"));
        assert!(encoded.get("expiresAt").is_none());
        assert!(encoded.get("timestamp").is_some());

        let decoded: Entry = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_approximate_size_grows_with_value() {
        let small = Entry::new(json!("a"));
        let large = Entry::new(json!("a".repeat(100)));
        assert!(small.approximate_size() > 0);
        assert!(large.approximate_size() > small.approximate_size());
    }
}
