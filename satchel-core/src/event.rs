//! Operation-result notifications.

use crate::{Namespace, StorageError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which storage operation an event reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageEventKind {
    #[serde(rename = "storage:set")]
    Set,
    #[serde(rename = "storage:get")]
    Get,
    #[serde(rename = "storage:remove")]
    Remove,
    #[serde(rename = "storage:clear")]
    Clear,
}

impl StorageEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Set => "storage:set",
            Self::Get => "storage:get",
            Self::Remove => "storage:remove",
            Self::Clear => "storage:clear",
        }
    }
}

impl fmt::Display for StorageEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one storage operation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEvent {
    #[serde(rename = "type")]
    pub kind: StorageEventKind,
    pub plugin_id: String,
    /// `plugin` or `shared:<name>`.
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StorageEvent {
    /// Build the event for an operation that finished with `outcome`.
    pub fn from_outcome<T>(
        kind: StorageEventKind,
        plugin_id: &str,
        namespace: &Namespace,
        key: Option<&str>,
        outcome: &Result<T, StorageError>,
    ) -> Self {
        Self {
            kind,
            plugin_id: plugin_id.to_string(),
            namespace: namespace.label(),
            key: key.map(str::to_string),
            success: outcome.is_ok(),
            error: outcome.as_ref().err().map(ToString::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_event_shape() {
        let ns = Namespace::Plugin("weather".to_string());
        let event = StorageEvent::from_outcome(
            StorageEventKind::Set,
            "weather",
            &ns,
            Some("city"),
            &Ok::<(), StorageError>(()),
        );
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "storage:set",
                "pluginId": "weather",
                "namespace": "plugin",
                "key": "city",
                "success": true
            })
        );
    }

    #[test]
    fn test_failure_event_carries_message() {
        let ns = Namespace::Shared("tabs".to_string());
        let outcome: Result<(), StorageError> = Err(StorageError::backend("disk full"));
        let event =
            StorageEvent::from_outcome(StorageEventKind::Clear, "weather", &ns, None, &outcome);
        assert!(!event.success);
        assert_eq!(event.error.as_deref(), Some("disk full"));
        assert_eq!(event.namespace, "shared:tabs");
        assert!(event.key.is_none());
    }

    #[test]
    fn test_kind_strings() {
        assert_eq!(StorageEventKind::Get.to_string(), "storage:get");
        assert_eq!(StorageEventKind::Remove.as_str(), "storage:remove");
        let decoded: StorageEventKind = serde_json::from_value(json!("storage:clear")).unwrap();
        assert_eq!(decoded, StorageEventKind::Clear);
    }
}
