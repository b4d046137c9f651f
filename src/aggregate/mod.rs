//! Reply aggregate - the single accumulator for one request
//!
//! A reply collects everything the platform encoder needs:
//! - Spoken/text statements in render order
//! - An optional reprompt
//! - Results of applied directives
//! - The termination flag and session attributes
//!
//! It enforces two invariants: a terminated reply takes no further
//! statements, and at most one directive result per exclusivity group.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{DialogError, DialogResult};
use crate::value_objects::ViewFlavor;
use crate::views::value_text;

/// Result written by one directive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedDirective {
    /// Directive kind, e.g. `Hint`, `PlayAudio`
    pub kind: String,
    /// Exclusivity group, if the directive declared one
    pub group: Option<String>,
    /// Structured payload for the encoder
    pub payload: Value,
}

impl AppliedDirective {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            group: None,
            payload,
        }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// Outbound reply accumulator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    statements: Vec<String>,
    reprompt: Option<String>,
    directives: Vec<AppliedDirective>,
    terminated: bool,
    session_attributes: Map<String, Value>,
}

impl Reply {
    /// Create an empty, open reply
    pub fn new() -> Self {
        Self::default()
    }

    /// Generic failure reply: one statement, terminated session
    pub fn fallback(message: impl Into<String>) -> Self {
        Self {
            statements: vec![message.into()],
            terminated: true,
            ..Self::default()
        }
    }

    /// Statements in the order they were written
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Statements joined into one utterance
    pub fn speech(&self) -> String {
        self.statements.join(" ")
    }

    pub fn reprompt(&self) -> Option<&str> {
        self.reprompt.as_deref()
    }

    pub fn directives(&self) -> &[AppliedDirective] {
        &self.directives
    }

    /// First directive result of `kind`
    pub fn directive(&self, kind: &str) -> Option<&AppliedDirective> {
        self.directives.iter().find(|d| d.kind == kind)
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn session_attributes(&self) -> &Map<String, Value> {
        &self.session_attributes
    }

    /// True when nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty() && self.reprompt.is_none() && self.directives.is_empty()
    }

    /// Whether a result from `group` was already written
    pub fn has_group(&self, group: &str) -> bool {
        self.directives
            .iter()
            .any(|d| d.group.as_deref() == Some(group))
    }

    /// Append a statement
    pub fn add_statement(&mut self, statement: impl Into<String>) -> DialogResult<()> {
        if self.terminated {
            return Err(DialogError::ReplyTerminated);
        }

        let statement = statement.into();
        if !statement.is_empty() {
            self.statements.push(statement);
        }
        Ok(())
    }

    /// Replace the reprompt
    pub fn set_reprompt(&mut self, reprompt: impl Into<String>) {
        self.reprompt = Some(reprompt.into());
    }

    /// Record a directive result, enforcing its exclusivity group
    pub fn add_directive(&mut self, directive: AppliedDirective) -> DialogResult<()> {
        if let Some(group) = &directive.group {
            if self.has_group(group) {
                return Err(DialogError::DuplicateDirective(group.clone()));
            }
        }

        self.directives.push(directive);
        Ok(())
    }

    /// End the session with this reply
    pub fn terminate(&mut self) {
        self.terminated = true;
    }

    pub fn set_session_attributes(&mut self, attributes: Map<String, Value>) {
        self.session_attributes = attributes;
    }

    /// Write a rendered view according to how it was declared
    pub fn append_view(&mut self, flavor: ViewFlavor, rendered: Value) -> DialogResult<()> {
        match (flavor, rendered) {
            (_, Value::Null) => Ok(()),
            // Structured views carry their own say/ask/tell keys
            (_, Value::Object(map)) => self.append_view_object(map),
            (flavor, Value::Array(items)) => {
                for item in items {
                    self.append_view(flavor, item)?;
                }
                Ok(())
            }
            (ViewFlavor::Reply | ViewFlavor::Say, Value::String(text)) => self.add_statement(text),
            (ViewFlavor::Ask, Value::String(text)) => {
                self.add_statement(text.clone())?;
                if self.reprompt.is_none() {
                    self.reprompt = Some(text);
                }
                Ok(())
            }
            (ViewFlavor::Tell, Value::String(text)) => {
                self.add_statement(text)?;
                self.terminate();
                Ok(())
            }
            (ViewFlavor::Reprompt, Value::String(text)) => {
                self.set_reprompt(text);
                Ok(())
            }
            (flavor, scalar) => self.append_view(flavor, Value::String(scalar.to_string())),
        }
    }

    fn append_view_object(&mut self, map: Map<String, Value>) -> DialogResult<()> {
        let mut terminate = false;
        let mut ask_text = None;

        for key in ["say", "ask", "tell"] {
            if let Some(value) = map.get(key) {
                let text = value_text(value);
                self.add_statement(text.clone())?;
                match key {
                    "ask" => ask_text = Some(text),
                    "tell" => terminate = true,
                    _ => {}
                }
            }
        }

        if let Some(reprompt) = map.get("reprompt") {
            self.set_reprompt(value_text(reprompt));
        } else if let Some(text) = ask_text {
            if self.reprompt.is_none() {
                self.reprompt = Some(text);
            }
        }

        for (key, value) in map {
            if matches!(key.as_str(), "say" | "ask" | "tell" | "reprompt") {
                continue;
            }
            let mut directive = AppliedDirective::new(key, value);
            directive.group = view_key_group(&directive.kind).map(str::to_string);
            self.add_directive(directive)?;
        }

        if terminate {
            self.terminate();
        }
        Ok(())
    }

    /// Fold another in-flight reply into this one
    pub fn merge(&mut self, other: Reply) -> DialogResult<()> {
        for statement in other.statements {
            self.add_statement(statement)?;
        }
        if let Some(reprompt) = other.reprompt {
            self.reprompt = Some(reprompt);
        }
        for directive in other.directives {
            self.add_directive(directive)?;
        }
        if other.terminated {
            self.terminate();
        }
        Ok(())
    }
}

/// Exclusivity group of a structured view key that names a directive slot
///
/// Keys outside this list stay ungrouped.
fn view_key_group(key: &str) -> Option<&'static str> {
    match key.to_ascii_lowercase().as_str() {
        "hint" => Some("Hint"),
        "card" | "homecard" | "basiccard" => Some("Card"),
        "carousel" => Some("Carousel"),
        "list" => Some("List"),
        "table" => Some("Table"),
        "playaudio" | "stopaudio" => Some("AudioPlayer"),
        "mediaresponse" => Some("Media"),
        _ => None,
    }
}
