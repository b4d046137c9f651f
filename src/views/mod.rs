//! Localized response templates
//!
//! The view store is a read model keyed by locale. It is loaded once at
//! startup and shared between requests; [`Renderer`] resolves paths in it
//! and interpolates `{variable}` placeholders.

pub mod renderer;
mod text;
pub mod variables;

use anyhow::Context;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub use renderer::Renderer;
pub(crate) use text::{pick_one, value_text};
pub use variables::{Variable, VariableRegistry, variable, variable_fn};

/// Immutable locale-keyed template tree
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewStore {
    locales: HashMap<String, Value>,
}

impl ViewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `{ "<locale>": { ...tree... } }`
    pub fn from_value(value: Value) -> anyhow::Result<Self> {
        let Value::Object(locales) = value else {
            anyhow::bail!("view store root must be an object keyed by locale");
        };

        let mut store = Self::new();
        for (locale, tree) in locales {
            store = store.with_locale(locale, tree);
        }
        Ok(store)
    }

    /// Parse a JSON document
    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let value: Value = serde_json::from_str(raw).context("failed to parse views")?;
        Self::from_value(value)
    }

    /// Load a JSON file
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read views from {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    /// Add or replace one locale's tree
    pub fn with_locale(mut self, locale: impl Into<String>, tree: Value) -> Self {
        // Trees are usually wrapped as `{ "translation": {...} }` by i18n tooling
        let tree = match tree {
            Value::Object(mut map) if map.len() == 1 && map.contains_key("translation") => {
                map.remove("translation").unwrap_or(Value::Object(Map::new()))
            }
            other => other,
        };
        self.locales.insert(locale.into(), tree);
        self
    }

    pub fn has_locale(&self, locale: &str) -> bool {
        self.locales.contains_key(locale)
    }

    pub fn locales(&self) -> Vec<&str> {
        let mut locales: Vec<&str> = self.locales.keys().map(String::as_str).collect();
        locales.sort_unstable();
        locales
    }

    /// Walk a dot path under `locale`; numeric segments index arrays
    pub fn lookup(&self, locale: &str, path: &str) -> Option<&Value> {
        let mut node = self.locales.get(locale)?;
        for segment in path.split('.') {
            node = match node {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }

        match node {
            Value::Null => None,
            node => Some(node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> ViewStore {
        ViewStore::from_value(json!({
            "en-US": {
                "translation": {
                    "Exit": { "Bye": "Goodbye" },
                    "Facts": ["One", "Two"],
                    "Empty": null
                }
            },
            "de-DE": { "Exit": { "Bye": "Tschüss" } }
        }))
        .unwrap()
    }

    #[test]
    fn test_lookup() {
        let store = store();
        assert_eq!(store.lookup("en-US", "Exit.Bye"), Some(&json!("Goodbye")));
        assert_eq!(store.lookup("de-DE", "Exit.Bye"), Some(&json!("Tschüss")));
        assert_eq!(store.lookup("en-US", "Facts.1"), Some(&json!("Two")));
        assert_eq!(store.lookup("en-US", "Facts"), Some(&json!(["One", "Two"])));
    }

    #[test]
    fn test_lookup_misses() {
        let store = store();
        assert_eq!(store.lookup("fr-FR", "Exit.Bye"), None);
        assert_eq!(store.lookup("en-US", "Exit.Hello"), None);
        assert_eq!(store.lookup("en-US", "Exit.Bye.Deeper"), None);
        assert_eq!(store.lookup("en-US", "Empty"), None);
        assert_eq!(store.lookup("en-US", "Facts.7"), None);
    }

    #[test]
    fn test_root_must_be_object() {
        assert!(ViewStore::from_value(json!(["en-US"])).is_err());
        assert!(ViewStore::from_json_str("{ not json").is_err());
        assert_eq!(store().locales(), ["de-DE", "en-US"]);
    }
}
