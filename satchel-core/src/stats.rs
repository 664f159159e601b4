//! Aggregate usage statistics.

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Point-in-time usage of a plugin's durable storage.
///
/// Computed fresh on every request and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    pub total_entries: u64,
    /// Approximate serialized size in bytes.
    pub total_size: u64,
    /// Entry count per namespace label.
    pub namespaces: BTreeMap<String, u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oldest_entry: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newest_entry: Option<Timestamp>,
}

impl StatisticsSnapshot {
    /// Fold one entry into the running totals.
    pub fn record(&mut self, namespace_label: &str, size: u64, timestamp: Timestamp) {
        self.total_entries += 1;
        self.total_size += size;
        *self
            .namespaces
            .entry(namespace_label.to_string())
            .or_insert(0) += 1;
        self.oldest_entry = Some(self.oldest_entry.map_or(timestamp, |t| t.min(timestamp)));
        self.newest_entry = Some(self.newest_entry.map_or(timestamp, |t| t.max(timestamp)));
    }

    pub fn is_empty(&self) -> bool {
        self.total_entries == 0
    }

    pub fn count_for(&self, namespace_label: &str) -> u64 {
        self.namespaces.get(namespace_label).copied().unwrap_or(0)
    }
}
