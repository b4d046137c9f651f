//! Dialog flow module
//!
//! This crate drives voice/chat conversations through a declarative state
//! table. It provides:
//! - A transition engine cascading intents through registered states
//! - Localized view rendering with `{variable}` interpolation
//! - A directive pipeline for cards, audio, lists and dialog management
//! - A reply accumulator and the orchestrator gluing the three together
//!
//! Platform encoding and decoding live outside this crate; a request enters
//! as a [`DialogEvent`] and leaves as a [`Reply`].

pub mod aggregate;
pub mod app;
pub mod config;
pub mod directives;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod session;
pub mod state_machine;
pub mod value_objects;
pub mod views;

// Re-export main types
pub use aggregate::{AppliedDirective, Reply};
pub use app::{DialogApp, DialogAppBuilder};
pub use config::{DEFAULT_MAX_TRANSITIONS, DialogConfig, load_config};
pub use directives::{Directive, DirectivePipeline};
pub use errors::{DialogError, DialogResult, ErrorKind};
pub use events::{DialogContext, DialogEvent};

pub use handlers::{
    AfterStateChangedHook, BeforeStateChangedHook, ErrorHook, Handler, HandlerResult, ReplyHook,
    RequestHook, StateHandlers, TransitionSpec, UnhandledStateHook,
    after_state_changed_hook, before_state_changed_hook, error_hook, handler, handler_fn,
    reply_hook, request_hook, unhandled_state_hook,
};

pub use session::{InMemorySessionStore, SessionStore};
pub use state_machine::{DEFAULT_HANDLER_KEY, State, StateMachine, Transition, TransitionListener};

pub use value_objects::{
    Capabilities, Flow, Intent, Model, SessionData, ViewFlavor, ViewRef,
};

pub use views::{Renderer, Variable, VariableRegistry, ViewStore, variable, variable_fn};
