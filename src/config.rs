//! Dialog configuration
//!
//! A single configuration object is built at startup and shared by
//! reference with the state machine, renderer and orchestrator.

use std::{fs, path::Path};

use anyhow::Context;
use serde::Deserialize;

/// Default bound on cascading transitions within one request
pub const DEFAULT_MAX_TRANSITIONS: usize = 25;

/// Names, bounds and fallback text used by the dialog core
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DialogConfig {
    /// Session-start state
    pub entry_state: String,
    /// Implicit terminal state, also the default transition target
    pub terminal_state: String,
    /// Upper bound on state changes per request
    pub max_transitions: usize,
    /// Locale used when an event does not carry one
    pub default_locale: String,
    /// Statement spoken when a request fails
    pub fallback_message: String,
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            entry_state: "entry".into(),
            terminal_state: "die".into(),
            max_transitions: DEFAULT_MAX_TRANSITIONS,
            default_locale: "en-US".into(),
            fallback_message: "Sorry, something went wrong.".into(),
        }
    }
}

impl DialogConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        toml::from_str(raw).context("failed to parse dialog configuration")
    }

    /// Apply `DIALOG__*` environment overrides
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("DIALOG__ENTRY_STATE") {
            self.entry_state = v;
        }
        if let Some(v) = lookup("DIALOG__TERMINAL_STATE") {
            self.terminal_state = v;
        }
        if let Some(v) = lookup("DIALOG__MAX_TRANSITIONS") {
            match v.parse::<usize>() {
                Ok(parsed) => self.max_transitions = parsed,
                Err(_) => tracing::warn!(value = %v, "ignoring invalid DIALOG__MAX_TRANSITIONS"),
            }
        }
        if let Some(v) = lookup("DIALOG__DEFAULT_LOCALE") {
            self.default_locale = v;
        }
        if let Some(v) = lookup("DIALOG__FALLBACK_MESSAGE") {
            self.fallback_message = v;
        }
    }

    /// Reject configurations the state machine cannot run with
    pub fn validate(&self) -> crate::DialogResult<()> {
        if self.entry_state.is_empty() {
            return Err(crate::DialogError::InvalidConfiguration(
                "entry_state must not be empty".to_string(),
            ));
        }
        if self.terminal_state.is_empty() {
            return Err(crate::DialogError::InvalidConfiguration(
                "terminal_state must not be empty".to_string(),
            ));
        }
        if self.entry_state == self.terminal_state {
            return Err(crate::DialogError::InvalidConfiguration(
                "entry_state and terminal_state must differ".to_string(),
            ));
        }
        if self.max_transitions == 0 {
            return Err(crate::DialogError::InvalidConfiguration(
                "max_transitions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration from an optional TOML file, then the environment
pub fn load_config(path: Option<&Path>) -> anyhow::Result<DialogConfig> {
    let mut config = match path {
        Some(path) if path.exists() => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            DialogConfig::from_toml_str(&raw)?
        }
        _ => DialogConfig::default(),
    };

    config.apply_env();
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = DialogConfig::default();
        assert_eq!(config.entry_state, "entry");
        assert_eq!(config.terminal_state, "die");
        assert_eq!(config.max_transitions, 25);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = DialogConfig::from_toml_str(
            r#"
            terminal_state = "exit"
            max_transitions = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.entry_state, "entry");
        assert_eq!(config.terminal_state, "exit");
        assert_eq!(config.max_transitions, 5);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("DIALOG__DEFAULT_LOCALE", "de-DE"),
            ("DIALOG__MAX_TRANSITIONS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = DialogConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.default_locale, "de-DE");
        assert_eq!(config.max_transitions, DEFAULT_MAX_TRANSITIONS);
    }

    #[test]
    fn test_validate_rejects_same_entry_and_terminal() {
        let config = DialogConfig {
            terminal_state: "entry".into(),
            ..DialogConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = load_config(Some(Path::new("/nonexistent/dialog.toml"))).unwrap();
        assert_eq!(config.terminal_state, "die");
    }
}
