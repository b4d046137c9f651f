//! Inbound dialog events and the per-request dialog context
//!
//! A platform decoder produces a [`DialogEvent`]; the orchestrator wraps it
//! in a [`DialogContext`] which is owned by exactly one request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::value_objects::{Capabilities, Intent, Model, SessionData};

/// A decoded inbound request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogEvent {
    pub request_id: Uuid,
    pub session_id: String,
    /// True on the first request of a session
    #[serde(default)]
    pub new_session: bool,
    pub intent: Option<Intent>,
    /// Locale string, e.g. `en-US`
    pub locale: Option<String>,
    #[serde(default)]
    pub capabilities: Capabilities,
    /// Attributes echoed back from the previous reply
    #[serde(default)]
    pub session_attributes: Map<String, Value>,
    pub received_at: DateTime<Utc>,
}

impl DialogEvent {
    /// Create a fresh-session event for `intent`
    pub fn new(session_id: impl Into<String>, intent: Intent) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            session_id: session_id.into(),
            new_session: true,
            intent: Some(intent),
            locale: None,
            capabilities: Capabilities::default(),
            session_attributes: Map::new(),
            received_at: Utc::now(),
        }
    }

    /// Set the locale
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Set the surface capabilities
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Continue an existing session with the given attributes
    pub fn with_session_attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.new_session = false;
        self.session_attributes = attributes;
        self
    }
}

/// Per-request context handed to handlers, variables and directives
#[derive(Debug, Clone)]
pub struct DialogContext {
    pub request_id: Uuid,
    pub session_id: String,
    pub new_session: bool,
    pub intent: Option<Intent>,
    pub locale: String,
    pub capabilities: Capabilities,
    /// Mutable session payload
    pub model: Model,
    state: Option<String>,
}

impl DialogContext {
    /// Build a context from an event, restoring state and model from its attributes
    pub fn from_event(event: DialogEvent, default_locale: &str) -> Self {
        let session = SessionData::from_attributes(&event.session_attributes);
        Self {
            request_id: event.request_id,
            session_id: event.session_id,
            new_session: event.new_session,
            intent: event.intent,
            locale: event.locale.unwrap_or_else(|| default_locale.to_string()),
            capabilities: event.capabilities,
            model: session.model,
            state: session.state,
        }
    }

    /// Context with only an intent and a locale, mostly useful in tests
    pub fn new(intent: Option<Intent>, locale: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            session_id: Uuid::new_v4().to_string(),
            new_session: true,
            intent,
            locale: locale.into(),
            capabilities: Capabilities::default(),
            model: Model::new(),
            state: None,
        }
    }

    /// Name of the inbound intent
    pub fn intent_name(&self) -> Option<&str> {
        self.intent.as_ref().map(|intent| intent.name.as_str())
    }

    /// Slot/parameter value of the inbound intent
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.intent.as_ref().and_then(|intent| intent.params.get(name))
    }

    /// Persisted state name, `None` on a fresh session
    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    pub fn set_state(&mut self, state: Option<String>) {
        self.state = state;
    }

    /// Replace the restored session (state and model)
    pub fn restore(&mut self, session: SessionData) {
        self.state = session.state;
        self.model = session.model;
    }

    /// Snapshot of what should be persisted after this request
    pub fn session_data(&self) -> SessionData {
        SessionData {
            state: self.state.clone(),
            model: self.model.clone(),
            updated_at: Some(Utc::now()),
        }
    }
}
