//! Namespaced backend keys.
//!
//! Every key handed to the backend has the shape `<tag>:<owner>:<logical>`:
//!
//! - `plugin:<pluginId>:<logicalKey>` for plugin-private data
//! - `shared:<sharedNamespace>:<logicalKey>` for cross-plugin data
//!
//! Owners (plugin ids and shared namespace names) may not contain the
//! separator, while logical keys may. Parsing splits on the first two
//! separators only, which makes [`KeySchema::parse`] the exact inverse of
//! key construction.

use crate::StorageError;
use std::fmt;

/// Separator between key segments.
pub const SEPARATOR: char = ':';

/// Namespace tag for plugin-private keys.
pub const PLUGIN_TAG: &str = "plugin";

/// Namespace tag for shared keys.
pub const SHARED_TAG: &str = "shared";

/// Reserved logical key holding a plugin's configuration.
pub const CONFIG_KEY: &str = "__config__";

/// Reserved logical key prefix for migration markers.
pub const MIGRATION_PREFIX: &str = "__migration__";

/// The namespace a backend key belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    /// Private data of the named plugin.
    Plugin(String),
    /// Data in the named shared namespace.
    Shared(String),
}

impl Namespace {
    /// The plugin id or shared namespace name.
    pub fn owner(&self) -> &str {
        match self {
            Self::Plugin(id) => id,
            Self::Shared(name) => name,
        }
    }

    /// Label used for statistics and events: `plugin` or `shared:<name>`.
    pub fn label(&self) -> String {
        match self {
            Self::Plugin(_) => PLUGIN_TAG.to_string(),
            Self::Shared(name) => format!("{SHARED_TAG}{SEPARATOR}{name}"),
        }
    }

    /// Prefix shared by every backend key in this namespace.
    pub fn prefix(&self) -> String {
        let tag = match self {
            Self::Plugin(_) => PLUGIN_TAG,
            Self::Shared(_) => SHARED_TAG,
        };
        format!("{tag}{SEPARATOR}{}{SEPARATOR}", self.owner())
    }

    /// Backend key for `logical_key` in this namespace.
    pub fn key(&self, logical_key: &str) -> String {
        let mut key = self.prefix();
        key.push_str(logical_key);
        key
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// A backend key split into its namespace and logical key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedKey {
    pub namespace: Namespace,
    pub logical_key: String,
}

/// Key construction and parsing for one plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    namespace: Namespace,
}

impl KeySchema {
    /// Create the schema for `plugin_id`.
    ///
    /// Fails when the id is empty or contains the separator, since such an
    /// id would make parsing ambiguous.
    pub fn new(plugin_id: impl Into<String>) -> Result<Self, StorageError> {
        let plugin_id = plugin_id.into();
        validate_owner(&plugin_id)?;
        Ok(Self {
            namespace: Namespace::Plugin(plugin_id),
        })
    }

    pub fn plugin_id(&self) -> &str {
        self.namespace.owner()
    }

    /// This plugin's private namespace.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn private_key(&self, logical_key: &str) -> String {
        self.namespace.key(logical_key)
    }

    /// Backend key for `logical_key` under the shared namespace `shared`.
    pub fn shared_key(shared: &str, logical_key: &str) -> Result<String, StorageError> {
        Ok(Self::shared_namespace(shared)?.key(logical_key))
    }

    /// Validated shared namespace.
    pub fn shared_namespace(shared: &str) -> Result<Namespace, StorageError> {
        validate_owner(shared)?;
        Ok(Namespace::Shared(shared.to_string()))
    }

    pub fn config_key(&self) -> String {
        self.private_key(CONFIG_KEY)
    }

    /// Logical key of the marker for `version`.
    pub fn migration_logical_key(version: &str) -> String {
        format!("{MIGRATION_PREFIX}{SEPARATOR}{version}")
    }

    pub fn migration_key(&self, version: &str) -> String {
        self.private_key(&Self::migration_logical_key(version))
    }

    /// Parse any backend key. Keys with an unknown tag or a missing owner
    /// are not ours and yield `None`.
    pub fn parse(key: &str) -> Option<ParsedKey> {
        let mut parts = key.splitn(3, SEPARATOR);
        let tag = parts.next()?;
        let owner = parts.next()?;
        let logical_key = parts.next()?;

        if owner.is_empty() {
            return None;
        }

        let namespace = match tag {
            PLUGIN_TAG => Namespace::Plugin(owner.to_string()),
            SHARED_TAG => Namespace::Shared(owner.to_string()),
            _ => return None,
        };

        Some(ParsedKey {
            namespace,
            logical_key: logical_key.to_string(),
        })
    }

    /// The logical key, if `key` lives in this plugin's private namespace.
    pub fn own_logical_key<'k>(&self, key: &'k str) -> Option<&'k str> {
        key.strip_prefix(&self.namespace.prefix())
    }

    /// True for `__config__` and migration markers.
    pub fn is_reserved(logical_key: &str) -> bool {
        logical_key == CONFIG_KEY
            || logical_key
                .strip_prefix(MIGRATION_PREFIX)
                .is_some_and(|rest| rest.starts_with(SEPARATOR))
    }
}

fn validate_owner(owner: &str) -> Result<(), StorageError> {
    if owner.is_empty() {
        return Err(StorageError::InvalidNamespace {
            namespace: owner.to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    if owner.contains(SEPARATOR) {
        return Err(StorageError::InvalidNamespace {
            namespace: owner.to_string(),
            reason: format!("must not contain '{SEPARATOR}'"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_key_shape() {
        let schema = KeySchema::new("weather").unwrap();
        assert_eq!(schema.private_key("city"), "plugin:weather:city");
        assert_eq!(schema.config_key(), "plugin:weather:__config__");
        assert_eq!(schema.migration_key("2.0.0"), "plugin:weather:__migration__:2.0.0");
    }

    #[test]
    fn test_shared_key_shape() {
        let key = KeySchema::shared_key("bookmarks", "list").unwrap();
        assert_eq!(key, "shared:bookmarks:list");
    }

    #[test]
    fn test_rejects_invalid_owners() {
        assert!(KeySchema::new("").is_err());
        assert!(KeySchema::new("a:b").is_err());
        assert!(KeySchema::shared_key("x:y", "k").is_err());
        assert!(KeySchema::shared_key("", "k").is_err());
    }

    #[test]
    fn test_parse_plugin_key_with_separator_in_logical_key() {
        let parsed = KeySchema::parse("plugin:weather:__migration__:2.0.0").unwrap();
        assert_eq!(parsed.namespace, Namespace::Plugin("weather".to_string()));
        assert_eq!(parsed.logical_key, "__migration__:2.0.0");
    }

    #[test]
    fn test_parse_rejects_foreign_keys() {
        assert!(KeySchema::parse("settings").is_none());
        assert!(KeySchema::parse("plugin:weather").is_none());
        assert!(KeySchema::parse("plugin::key").is_none());
        assert!(KeySchema::parse("session:abc:key").is_none());
    }

    #[test]
    fn test_own_logical_key_filters_other_plugins() {
        let schema = KeySchema::new("weather").unwrap();
        assert_eq!(schema.own_logical_key("plugin:weather:city"), Some("city"));
        assert_eq!(schema.own_logical_key("plugin:weatherman:city"), None);
        assert_eq!(schema.own_logical_key("shared:weather:city"), None);
    }

    #[test]
    fn test_reserved_keys() {
        assert!(KeySchema::is_reserved(CONFIG_KEY));
        assert!(KeySchema::is_reserved("__migration__:1.0.0"));
        assert!(!KeySchema::is_reserved("__migration__"));
        assert!(!KeySchema::is_reserved("city"));
    }

    #[test]
    fn test_namespace_labels() {
        assert_eq!(Namespace::Plugin("p".to_string()).label(), "plugin");
        assert_eq!(Namespace::Shared("tabs".to_string()).label(), "shared:tabs");
    }
}
