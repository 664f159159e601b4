//! Plugin configuration record and its shallow merge.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Display preferences stored alongside a plugin's configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UiPreferences {
    pub theme: String,
    pub language: String,
    pub notifications: bool,
}

impl Default for UiPreferences {
    fn default() -> Self {
        Self {
            theme: "auto".to_string(),
            language: "en".to_string(),
            notifications: true,
        }
    }
}

/// Configuration of one plugin, stored under its `__config__` key.
///
/// Missing fields in a stored record take their defaults when read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub enabled: bool,
    pub settings: Map<String, Value>,
    pub domains: Vec<String>,
    pub permissions: Vec<String>,
    pub ui_preferences: UiPreferences,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            id: None,
            name: None,
            version: None,
            enabled: true,
            settings: Map::new(),
            domains: Vec::new(),
            permissions: Vec::new(),
            ui_preferences: UiPreferences::default(),
        }
    }
}

impl PluginConfig {
    /// Apply `patch` field by field. A field present in the patch replaces
    /// the current field wholesale; nested records are not merged.
    pub fn merged(mut self, patch: ConfigPatch) -> Self {
        let ConfigPatch {
            id,
            name,
            version,
            enabled,
            settings,
            domains,
            permissions,
            ui_preferences,
        } = patch;

        if let Some(id) = id {
            self.id = Some(id);
        }
        if let Some(name) = name {
            self.name = Some(name);
        }
        if let Some(version) = version {
            self.version = Some(version);
        }
        if let Some(enabled) = enabled {
            self.enabled = enabled;
        }
        if let Some(settings) = settings {
            self.settings = settings;
        }
        if let Some(domains) = domains {
            self.domains = domains;
        }
        if let Some(permissions) = permissions {
            self.permissions = permissions;
        }
        if let Some(ui_preferences) = ui_preferences {
            self.ui_preferences = ui_preferences;
        }
        self
    }
}

/// Partial configuration accepted by `setConfig`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domains: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_preferences: Option<UiPreferences>,
}

impl ConfigPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn with_settings(mut self, settings: Map<String, Value>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_domains(mut self, domains: Vec<String>) -> Self {
        self.domains = Some(domains);
        self
    }

    pub fn with_permissions(mut self, permissions: Vec<String>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub fn with_ui_preferences(mut self, ui_preferences: UiPreferences) -> Self {
        self.ui_preferences = Some(ui_preferences);
        self
    }

    pub fn with_identity(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        self.id = Some(id.into());
        self.name = Some(name.into());
        self.version = Some(version.into());
        self
    }

    /// True when the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_serialized_shape() {
        let encoded = serde_json::to_value(PluginConfig::default()).unwrap();
        assert_eq!(
            encoded,
            json!({
                "enabled": true,
                "settings": {},
                "domains": [],
                "permissions": [],
                "uiPreferences": {"theme": "auto", "language": "en", "notifications": true}
            })
        );
    }

    #[test]
    fn test_partial_record_fills_defaults() {
        let config: PluginConfig =
            serde_json::from_value(json!({"enabled": false, "settings": {"theme": "light"}}))
                .unwrap();
        assert!(!config.enabled);
        assert_eq!(config.settings.get("theme"), Some(&json!("light")));
        assert!(config.domains.is_empty());
        assert_eq!(config.ui_preferences, UiPreferences::default());
    }

    #[test]
    fn test_merge_replaces_top_level_fields_wholesale() {
        let mut settings = Map::new();
        settings.insert("theme".to_string(), json!("light"));
        settings.insert("units".to_string(), json!("metric"));
        let current = PluginConfig {
            settings,
            domains: vec!["example.com".to_string()],
            ..PluginConfig::default()
        };

        let mut replacement = Map::new();
        replacement.insert("theme".to_string(), json!("dark"));
        let merged = current.merged(
            ConfigPatch::new()
                .with_enabled(false)
                .with_settings(replacement),
        );

        assert!(!merged.enabled);
        assert_eq!(merged.settings.len(), 1);
        assert_eq!(merged.settings.get("theme"), Some(&json!("dark")));
        assert_eq!(merged.domains, vec!["example.com".to_string()]);
    }

    #[test]
    fn test_identity_fields_pass_through() {
        let merged = PluginConfig::default()
            .merged(ConfigPatch::new().with_identity("weather", "Weather", "1.4.0"));
        assert_eq!(merged.id.as_deref(), Some("weather"));
        assert_eq!(merged.name.as_deref(), Some("Weather"));
        assert_eq!(merged.version.as_deref(), Some("1.4.0"));
    }

    #[test]
    fn test_empty_patch() {
        assert!(ConfigPatch::new().is_empty());
        assert!(!ConfigPatch::new().with_enabled(true).is_empty());
        assert_eq!(
            PluginConfig::default().merged(ConfigPatch::new()),
            PluginConfig::default()
        );
    }
}
