//! State handlers and lifecycle callbacks
//!
//! Handlers are async functions over the [`DialogContext`]. They are stored
//! as `Arc<dyn Fn>` returning a boxed future so a state table can be shared
//! read-only between requests.

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;

use crate::aggregate::Reply;
use crate::directives::Directive;
use crate::errors::DialogResult;
use crate::events::DialogContext;
use crate::state_machine::{State, Transition};
use crate::value_objects::{Flow, ViewFlavor, ViewRef};

/// Async state handler
pub type Handler = Arc<
    dyn for<'a> Fn(&'a mut DialogContext) -> BoxFuture<'a, DialogResult<HandlerResult>>
        + Send
        + Sync,
>;

/// Invoked before each state's handler runs
pub type BeforeStateChangedHook = Arc<
    dyn for<'a> Fn(&'a mut DialogContext, Option<&'a Transition>, &'a State) -> BoxFuture<'a, DialogResult<()>>
        + Send
        + Sync,
>;

/// Invoked once a handler result was normalized into a transition
pub type AfterStateChangedHook = Arc<
    dyn for<'a> Fn(&'a mut DialogContext, &'a Transition) -> BoxFuture<'a, DialogResult<()>>
        + Send
        + Sync,
>;

/// Fallback for intents no handler in the current state accepts; receives the state name
pub type UnhandledStateHook = Arc<
    dyn for<'a> Fn(&'a mut DialogContext, &'a str) -> BoxFuture<'a, DialogResult<HandlerResult>>
        + Send
        + Sync,
>;

/// Request level hook (request started, session started)
pub type RequestHook =
    Arc<dyn for<'a> Fn(&'a mut DialogContext) -> BoxFuture<'a, DialogResult<()>> + Send + Sync>;

/// May adjust the reply right before it is handed to the encoder
pub type ReplyHook = Arc<
    dyn for<'a> Fn(&'a DialogContext, &'a mut Reply) -> BoxFuture<'a, DialogResult<()>>
        + Send
        + Sync,
>;

/// May produce a custom failure reply; `None` declines
pub type ErrorHook = Arc<
    dyn for<'a> Fn(&'a DialogContext, &'a crate::DialogError) -> BoxFuture<'a, Option<Reply>>
        + Send
        + Sync,
>;

/// Wrap an async closure as a [`Handler`]
///
/// ```ignore
/// let h = handler(|ctx| Box::pin(async move {
///     ctx.model.set("greeted", true)?;
///     Ok(TransitionSpec::to("die").tell("Exit.Bye").into())
/// }));
/// ```
pub fn handler<F>(f: F) -> Handler
where
    F: for<'a> Fn(&'a mut DialogContext) -> BoxFuture<'a, DialogResult<HandlerResult>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

/// Wrap a synchronous closure as a [`Handler`]
pub fn handler_fn<F>(f: F) -> Handler
where
    F: Fn(&mut DialogContext) -> DialogResult<HandlerResult> + Send + Sync + 'static,
{
    handler(move |ctx| {
        let result = f(ctx);
        Box::pin(async move { result })
    })
}

pub fn before_state_changed_hook<F>(f: F) -> BeforeStateChangedHook
where
    F: for<'a> Fn(&'a mut DialogContext, Option<&'a Transition>, &'a State) -> BoxFuture<'a, DialogResult<()>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

pub fn after_state_changed_hook<F>(f: F) -> AfterStateChangedHook
where
    F: for<'a> Fn(&'a mut DialogContext, &'a Transition) -> BoxFuture<'a, DialogResult<()>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

pub fn unhandled_state_hook<F>(f: F) -> UnhandledStateHook
where
    F: for<'a> Fn(&'a mut DialogContext, &'a str) -> BoxFuture<'a, DialogResult<HandlerResult>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

pub fn request_hook<F>(f: F) -> RequestHook
where
    F: for<'a> Fn(&'a mut DialogContext) -> BoxFuture<'a, DialogResult<()>> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub fn reply_hook<F>(f: F) -> ReplyHook
where
    F: for<'a> Fn(&'a DialogContext, &'a mut Reply) -> BoxFuture<'a, DialogResult<()>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

pub fn error_hook<F>(f: F) -> ErrorHook
where
    F: for<'a> Fn(&'a DialogContext, &'a crate::DialogError) -> BoxFuture<'a, Option<Reply>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

/// What a handler returns
#[derive(Default)]
pub enum HandlerResult {
    /// Transition-shaped result
    Transition(TransitionSpec),
    /// Bare view path; implies a terminal transition
    View(String),
    /// An in-flight reply to fold into the accumulator
    Reply(Reply),
    /// No response; triggers the unhandled fallbacks
    #[default]
    Empty,
}

impl HandlerResult {
    /// Whether this result counts as "no response"
    pub fn is_empty(&self) -> bool {
        match self {
            HandlerResult::Transition(spec) => spec.is_empty(),
            HandlerResult::View(path) => path.is_empty(),
            HandlerResult::Reply(_) => false,
            HandlerResult::Empty => true,
        }
    }
}

impl From<TransitionSpec> for HandlerResult {
    fn from(spec: TransitionSpec) -> Self {
        HandlerResult::Transition(spec)
    }
}

impl From<&str> for HandlerResult {
    fn from(path: &str) -> Self {
        HandlerResult::View(path.to_string())
    }
}

impl From<String> for HandlerResult {
    fn from(path: String) -> Self {
        HandlerResult::View(path)
    }
}

impl From<Reply> for HandlerResult {
    fn from(reply: Reply) -> Self {
        HandlerResult::Reply(reply)
    }
}

impl<T: Into<HandlerResult>> From<Option<T>> for HandlerResult {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

/// Builder for transition-shaped handler results
///
/// Views and directives keep the order the builder methods were called in.
#[derive(Default, Clone)]
pub struct TransitionSpec {
    pub to: Option<String>,
    pub views: Vec<ViewRef>,
    pub directives: Vec<Arc<dyn Directive>>,
    pub flow: Option<Flow>,
}

impl TransitionSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a transition towards `state`
    pub fn to(state: impl Into<String>) -> Self {
        Self {
            to: Some(state.into()),
            ..Self::default()
        }
    }

    pub fn goto(mut self, state: impl Into<String>) -> Self {
        self.to = Some(state.into());
        self
    }

    /// Render a view and interpret it by shape
    pub fn reply(self, path: impl Into<String>) -> Self {
        self.view(path, ViewFlavor::Reply)
    }

    pub fn say(self, path: impl Into<String>) -> Self {
        self.view(path, ViewFlavor::Say)
    }

    pub fn ask(self, path: impl Into<String>) -> Self {
        self.view(path, ViewFlavor::Ask)
    }

    pub fn tell(self, path: impl Into<String>) -> Self {
        self.view(path, ViewFlavor::Tell)
    }

    pub fn reprompt(self, path: impl Into<String>) -> Self {
        self.view(path, ViewFlavor::Reprompt)
    }

    fn view(mut self, path: impl Into<String>, flavor: ViewFlavor) -> Self {
        self.views.push(ViewRef::new(path, flavor));
        self
    }

    pub fn directive(mut self, directive: impl Directive + 'static) -> Self {
        self.directives.push(Arc::new(directive));
        self
    }

    pub fn flow(mut self, flow: Flow) -> Self {
        self.flow = Some(flow);
        self
    }

    /// True when nothing at all was declared
    pub fn is_empty(&self) -> bool {
        self.to.is_none() && self.views.is_empty() && self.directives.is_empty() && self.flow.is_none()
    }

    /// Whether any declared view is `flavor`
    pub fn declares(&self, flavor: ViewFlavor) -> bool {
        self.views.iter().any(|view| view.flavor == flavor)
    }
}

impl std::fmt::Debug for TransitionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionSpec")
            .field("to", &self.to)
            .field("views", &self.views)
            .field(
                "directives",
                &self.directives.iter().map(|d| d.kind()).collect::<Vec<_>>(),
            )
            .field("flow", &self.flow)
            .finish()
    }
}

/// Shapes a state registration can take
pub enum StateHandlers {
    /// One catch-all handler
    Function(Handler),
    /// Handler per intent name
    IntentMap(HashMap<String, Handler>),
    /// One handler for a list of intents
    IntentFilter { intents: Vec<String>, handler: Handler },
}

impl StateHandlers {
    /// Normalize into an intent map; the catch-all lives under `default_key`
    pub fn into_intent_map(self, default_key: &str) -> HashMap<String, Handler> {
        match self {
            StateHandlers::Function(handler) => {
                HashMap::from([(default_key.to_string(), handler)])
            }
            StateHandlers::IntentMap(map) => map,
            StateHandlers::IntentFilter { intents, handler } => intents
                .into_iter()
                .map(|intent| (intent, handler.clone()))
                .collect(),
        }
    }
}

impl From<Handler> for StateHandlers {
    fn from(handler: Handler) -> Self {
        StateHandlers::Function(handler)
    }
}

impl From<HashMap<String, Handler>> for StateHandlers {
    fn from(map: HashMap<String, Handler>) -> Self {
        StateHandlers::IntentMap(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_results() {
        assert!(HandlerResult::Empty.is_empty());
        assert!(HandlerResult::from("").is_empty());
        assert!(HandlerResult::from(TransitionSpec::new()).is_empty());
        assert!(HandlerResult::from(None::<&str>).is_empty());
        assert!(!HandlerResult::from("Exit.Bye").is_empty());
        assert!(!HandlerResult::from(TransitionSpec::new().flow(Flow::Yield)).is_empty());
    }

    #[test]
    fn test_builder_keeps_declaration_order() {
        let spec = TransitionSpec::to("die").say("A").tell("B").say("C");

        let paths: Vec<_> = spec.views.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, ["A", "B", "C"]);
        assert!(spec.declares(ViewFlavor::Tell));
        assert!(!spec.declares(ViewFlavor::Ask));
    }

    #[test]
    fn test_intent_filter_normalization() {
        let h = handler_fn(|_| Ok(HandlerResult::Empty));
        let map = StateHandlers::IntentFilter {
            intents: vec!["YesIntent".to_string(), "NoIntent".to_string()],
            handler: h,
        }
        .into_intent_map("entry");

        assert_eq!(map.len(), 2);
        assert!(map.contains_key("YesIntent"));
        assert!(map.contains_key("NoIntent"));
        assert!(!map.contains_key("entry"));
    }
}
