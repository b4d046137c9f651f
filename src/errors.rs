//! Error taxonomy for the dialog core
//!
//! Every failure surfaced while building the state table, running a
//! transition, rendering a view or applying a directive is a
//! [`DialogError`]. None of them are retried; the orchestrator turns them
//! into a fallback reply.

use thiserror::Error;

/// Result alias used across the crate
pub type DialogResult<T> = Result<T, DialogError>;

/// Coarse classification of a [`DialogError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid state table or builder input, raised at startup
    Configuration,
    /// Raised while the state machine runs
    Flow,
    /// Raised while resolving or interpolating a view
    Rendering,
    /// Raised while a directive writes to the reply
    Directive,
    /// Raised by user supplied handler or variable code
    Handler,
    /// Raised by the session store
    Session,
}

/// Errors produced by the dialog core
#[derive(Debug, Error)]
pub enum DialogError {
    #[error("State machine must have a `{0}` state")]
    MissingEntryState(String),

    #[error("State machine has no states")]
    EmptyStateTable,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Running the state machine without an intent")]
    MissingIntent,

    #[error("Unknown state {0}")]
    UnknownState(String),

    #[error("{intent} went unhandled on {state} state")]
    UnhandledState { intent: String, state: String },

    #[error("State machine exceeded {0} transitions in a single request")]
    TooManyTransitions(usize),

    #[error("View {path} for {locale} locale is missing")]
    MissingView { path: String, locale: String },

    #[error("No such variable in views, {0}")]
    MissingVariable(String),

    #[error("Variable {0} kept expanding into further placeholders")]
    RenderDepthExceeded(String),

    #[error("At most one {0} directive can be specified in a response")]
    DuplicateDirective(String),

    #[error("{0}")]
    DirectivePrecondition(String),

    #[error("Reply has already been terminated")]
    ReplyTerminated,

    #[error("Session store failure: {0}")]
    Session(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Handler(#[from] anyhow::Error),
}

impl DialogError {
    /// Which part of the taxonomy this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            DialogError::MissingEntryState(_)
            | DialogError::EmptyStateTable
            | DialogError::InvalidConfiguration(_) => ErrorKind::Configuration,
            DialogError::MissingIntent
            | DialogError::UnknownState(_)
            | DialogError::UnhandledState { .. }
            | DialogError::TooManyTransitions(_) => ErrorKind::Flow,
            DialogError::MissingView { .. }
            | DialogError::MissingVariable(_)
            | DialogError::RenderDepthExceeded(_) => ErrorKind::Rendering,
            DialogError::DuplicateDirective(_)
            | DialogError::DirectivePrecondition(_)
            | DialogError::ReplyTerminated => ErrorKind::Directive,
            DialogError::Session(_) => ErrorKind::Session,
            DialogError::Serialization(_) | DialogError::Handler(_) => ErrorKind::Handler,
        }
    }

    /// Build a handler error from any message
    pub fn handler(message: impl std::fmt::Display) -> Self {
        DialogError::Handler(anyhow::anyhow!("{message}"))
    }
}
