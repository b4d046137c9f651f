//! Value objects for the dialog core

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::errors::DialogResult;

/// Session-scoped key/value payload persisted across requests
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Model(Map<String, Value>);

impl Model {
    /// Create an empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a model from a serialized value; anything but an object yields an empty model
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    /// Raw value stored under `key`
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Typed value stored under `key`
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> DialogResult<Option<T>> {
        match self.0.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    /// Store a serializable value under `key`
    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> DialogResult<()> {
        self.0.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Remove and return the value under `key`
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialized form written to session attributes
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

/// A resolved user intent and its slot values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Intent name, e.g. `LaunchIntent`
    pub name: String,
    /// Slot/parameter values
    #[serde(default)]
    pub params: HashMap<String, Value>,
}

impl Intent {
    /// Create an intent without parameters
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: HashMap::new(),
        }
    }

    /// Add a slot value
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

/// What the requesting surface can present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capabilities {
    pub screen: bool,
    pub audio: bool,
    pub video: bool,
}

impl Capabilities {
    /// Voice-only surface
    pub fn voice_only() -> Self {
        Self {
            screen: false,
            audio: true,
            video: false,
        }
    }

    /// Surface with every capability
    pub fn all() -> Self {
        Self {
            screen: true,
            audio: true,
            video: true,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::voice_only()
    }
}

/// How a transition continues once its step is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    /// Run the target state within the same request
    Continue,
    /// End the request, keep the session open in the target state
    Yield,
    /// End the session
    Terminate,
}

/// How a rendered view is written to the reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewFlavor {
    /// Interpret the rendered value by its shape
    Reply,
    /// Append a statement
    Say,
    /// Append a statement and use it as the reprompt unless one is set
    Ask,
    /// Append a statement and terminate the reply
    Tell,
    /// Replace the reprompt
    Reprompt,
}

/// A view path declared by a transition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewRef {
    pub path: String,
    pub flavor: ViewFlavor,
}

impl ViewRef {
    pub fn new(path: impl Into<String>, flavor: ViewFlavor) -> Self {
        Self {
            path: path.into(),
            flavor,
        }
    }
}

/// What the session store keeps between requests
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    /// State the next request starts in; `None` means the entry state
    pub state: Option<String>,
    /// Restored model
    pub model: Model,
    /// When this record was last written
    pub updated_at: Option<DateTime<Utc>>,
}

impl SessionData {
    /// Session attributes shape: `{ "state": .., "model": .. }`
    pub fn to_attributes(&self) -> Map<String, Value> {
        let mut attributes = Map::new();
        attributes.insert(
            "state".to_string(),
            self.state.clone().map(Value::String).unwrap_or(Value::Null),
        );
        attributes.insert("model".to_string(), self.model.to_value());
        attributes
    }

    /// Restore from session attributes; unknown keys are ignored
    pub fn from_attributes(attributes: &Map<String, Value>) -> Self {
        let state = attributes
            .get("state")
            .and_then(Value::as_str)
            .map(str::to_string);
        let model = attributes
            .get("model")
            .cloned()
            .map(Model::from_value)
            .unwrap_or_default();

        Self {
            state,
            model,
            updated_at: None,
        }
    }
}
