//! Transition engine
//!
//! Drives one inbound intent through the state table:
//! - Resolves the current state from the session (entry on a fresh session)
//! - Picks the intent handler, falling back to the state's catch-all
//! - Normalizes the handler result into a [`Transition`]
//! - Cascades through `continue` transitions until a state yields or terminates

pub mod transition;

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::DialogConfig;
use crate::errors::{DialogError, DialogResult};
use crate::events::DialogContext;
use crate::handlers::{
    AfterStateChangedHook, BeforeStateChangedHook, Handler, HandlerResult, StateHandlers,
    UnhandledStateHook,
};

pub use transition::{Transition, normalize};

/// Intent-map key of a state's catch-all handler
pub const DEFAULT_HANDLER_KEY: &str = "entry";

/// A named state and its normalized intent map
pub struct State {
    pub name: String,
    pub is_terminal: bool,
    enter: HashMap<String, Handler>,
}

impl State {
    /// Create a state without handlers
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_terminal: false,
            enter: HashMap::new(),
        }
    }

    /// Create a terminal state
    pub fn terminal(name: impl Into<String>) -> Self {
        Self {
            is_terminal: true,
            ..Self::new(name)
        }
    }

    /// Merge a registration into the intent map; later registrations replace earlier ones
    pub fn register(&mut self, handlers: impl Into<StateHandlers>) {
        self.enter
            .extend(handlers.into().into_intent_map(DEFAULT_HANDLER_KEY));
    }

    pub fn with_handlers(mut self, handlers: impl Into<StateHandlers>) -> Self {
        self.register(handlers);
        self
    }

    /// Handler for `intent`, or the catch-all
    pub fn handler_for(&self, intent: &str) -> Option<&Handler> {
        self.enter
            .get(intent)
            .or_else(|| self.enter.get(DEFAULT_HANDLER_KEY))
    }

    /// Intents this state names explicitly
    pub fn intents(&self) -> Vec<&str> {
        let mut intents: Vec<&str> = self.enter.keys().map(String::as_str).collect();
        intents.sort_unstable();
        intents
    }
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("name", &self.name)
            .field("is_terminal", &self.is_terminal)
            .field("intents", &self.intents())
            .finish()
    }
}

/// Receives every transition as the engine produces it
#[async_trait]
pub trait TransitionListener: Send {
    async fn on_transition(
        &mut self,
        ctx: &DialogContext,
        transition: &Transition,
    ) -> DialogResult<()>;
}

#[async_trait]
impl TransitionListener for Vec<Transition> {
    async fn on_transition(
        &mut self,
        _ctx: &DialogContext,
        transition: &Transition,
    ) -> DialogResult<()> {
        self.push(transition.clone());
        Ok(())
    }
}

/// The state table plus its lifecycle callbacks
pub struct StateMachine {
    states: HashMap<String, State>,
    entry: String,
    terminal: String,
    max_transitions: usize,
    before_state_changed: Vec<BeforeStateChangedHook>,
    after_state_changed: Vec<AfterStateChangedHook>,
    unhandled_state: Vec<UnhandledStateHook>,
}

impl StateMachine {
    /// Build the engine; the table must be non-empty and contain the entry state
    pub fn new(config: &DialogConfig, states: impl IntoIterator<Item = State>) -> DialogResult<Self> {
        let mut states: HashMap<String, State> = states
            .into_iter()
            .map(|state| (state.name.clone(), state))
            .collect();

        if states.is_empty() {
            return Err(DialogError::EmptyStateTable);
        }
        if !states.contains_key(&config.entry_state) {
            return Err(DialogError::MissingEntryState(config.entry_state.clone()));
        }

        states
            .entry(config.terminal_state.clone())
            .or_insert_with(|| State::terminal(config.terminal_state.clone()));

        Ok(Self {
            states,
            entry: config.entry_state.clone(),
            terminal: config.terminal_state.clone(),
            max_transitions: config.max_transitions,
            before_state_changed: Vec::new(),
            after_state_changed: Vec::new(),
            unhandled_state: Vec::new(),
        })
    }

    pub fn with_before_state_changed(mut self, hooks: Vec<BeforeStateChangedHook>) -> Self {
        self.before_state_changed = hooks;
        self
    }

    pub fn with_after_state_changed(mut self, hooks: Vec<AfterStateChangedHook>) -> Self {
        self.after_state_changed = hooks;
        self
    }

    pub fn with_unhandled_state(mut self, hooks: Vec<UnhandledStateHook>) -> Self {
        self.unhandled_state = hooks;
        self
    }

    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.get(name)
    }

    pub fn entry_state(&self) -> &str {
        &self.entry
    }

    pub fn terminal_state(&self) -> &str {
        &self.terminal
    }

    fn lookup(&self, name: &str) -> DialogResult<&State> {
        self.states
            .get(name)
            .ok_or_else(|| DialogError::UnknownState(name.to_string()))
    }

    /// Run the intent in `ctx` until a state yields or terminates
    ///
    /// Every transition is handed to `listener` before the next state runs.
    /// On return the context's state holds where the next request starts
    /// (`None` once the session terminated).
    pub async fn run_transition(
        &self,
        ctx: &mut DialogContext,
        listener: &mut dyn TransitionListener,
    ) -> DialogResult<Transition> {
        let intent = ctx
            .intent_name()
            .ok_or(DialogError::MissingIntent)?
            .to_string();

        let mut current = self.lookup(ctx.state().unwrap_or(&self.entry))?;
        if current.is_terminal {
            current = self.lookup(&self.entry)?;
        }

        let mut previous: Option<Transition> = None;

        for _ in 0..self.max_transitions {
            for hook in &self.before_state_changed {
                hook(ctx, previous.as_ref(), current).await?;
            }

            let result = match current.handler_for(&intent) {
                Some(handler) => handler(ctx).await?,
                None => HandlerResult::Empty,
            };
            let result = if result.is_empty() {
                self.run_unhandled(ctx, &current.name, &intent).await?
            } else {
                result
            };

            let transition = normalize(&current.name, &intent, result, &self.terminal, |name| {
                self.states.get(name).map(|state| state.is_terminal)
            })?;

            debug!(
                state = %current.name,
                intent = %intent,
                to = ?transition.to,
                flow = ?transition.flow,
                terminated = transition.terminated,
                "state transition"
            );

            for hook in &self.after_state_changed {
                hook(ctx, &transition).await?;
            }

            listener.on_transition(ctx, &transition).await?;

            let next = self.lookup(transition.to.as_deref().unwrap_or(&self.terminal))?;
            if transition.stops() {
                let resume = (!transition.terminated).then(|| next.name.clone());
                ctx.set_state(resume);
                return Ok(transition);
            }

            current = next;
            previous = Some(transition);
        }

        Err(DialogError::TooManyTransitions(self.max_transitions))
    }

    async fn run_unhandled(
        &self,
        ctx: &mut DialogContext,
        state: &str,
        intent: &str,
    ) -> DialogResult<HandlerResult> {
        for hook in &self.unhandled_state {
            let result = hook(ctx, state).await?;
            if !result.is_empty() {
                warn!(state = %state, intent = %intent, "intent handled by unhandled-state fallback");
                return Ok(result);
            }
        }

        Err(DialogError::UnhandledState {
            intent: intent.to_string(),
            state: state.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{
        TransitionSpec, before_state_changed_hook, handler, handler_fn, unhandled_state_hook,
    };
    use crate::value_objects::{Flow, Intent};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context(intent: &str) -> DialogContext {
        DialogContext::new(Some(Intent::new(intent)), "en-US")
    }

    fn machine(states: Vec<State>) -> StateMachine {
        StateMachine::new(&DialogConfig::default(), states).unwrap()
    }

    #[test]
    fn test_construction_requires_entry() {
        let config = DialogConfig::default();

        let err = StateMachine::new(&config, Vec::new()).err().unwrap();
        assert!(matches!(err, DialogError::EmptyStateTable));

        let err = StateMachine::new(&config, vec![State::new("other")]).err().unwrap();
        assert_eq!(err.to_string(), "State machine must have a `entry` state");
    }

    #[test]
    fn test_terminal_state_is_implicit() {
        let machine = machine(vec![State::new("entry")]);
        assert!(machine.state("die").unwrap().is_terminal);
    }

    #[tokio::test]
    async fn test_intent_handler_preferred_over_catch_all() {
        let entry = State::new("entry")
            .with_handlers(handler_fn(|_| Ok("Catch.All".into())))
            .with_handlers(StateHandlers::IntentFilter {
                intents: vec!["HelpIntent".to_string()],
                handler: handler_fn(|_| Ok("Help.Say".into())),
            });
        let machine = machine(vec![entry]);

        let mut steps: Vec<Transition> = Vec::new();
        let mut ctx = context("HelpIntent");
        let transition = machine.run_transition(&mut ctx, &mut steps).await.unwrap();
        assert_eq!(transition.view_paths(), ["Help.Say"]);

        let mut ctx = context("OtherIntent");
        let transition = machine.run_transition(&mut ctx, &mut steps).await.unwrap();
        assert_eq!(transition.view_paths(), ["Catch.All"]);
        assert_eq!(steps.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_intent() {
        let machine = machine(vec![State::new("entry").with_handlers(handler_fn(|_| Ok("A".into())))]);
        let mut ctx = DialogContext::new(None, "en-US");

        let err = machine.run_transition(&mut ctx, &mut Vec::<Transition>::new()).await.unwrap_err();
        assert!(matches!(err, DialogError::MissingIntent));
    }

    #[tokio::test]
    async fn test_cascade_and_yield() {
        let entry = State::new("entry").with_handlers(handler_fn(|_| {
            Ok(TransitionSpec::to("greet").say("Launch.Say").into())
        }));
        let greet = State::new("greet").with_handlers(handler_fn(|_| {
            Ok(TransitionSpec::to("askName").ask("Ask.Name").into())
        }));
        let ask_name = State::new("askName");
        let machine = machine(vec![entry, greet, ask_name]);

        let mut steps: Vec<Transition> = Vec::new();
        let mut ctx = context("LaunchIntent");
        let last = machine.run_transition(&mut ctx, &mut steps).await.unwrap();

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].from, "entry");
        assert_eq!(steps[1].from, "greet");
        assert_eq!(last.flow, Flow::Yield);
        assert_eq!(ctx.state(), Some("askName"));
    }

    #[tokio::test]
    async fn test_resumes_from_persisted_state() {
        let entry = State::new("entry").with_handlers(handler_fn(|_| Ok("Wrong".into())));
        let ask_name = State::new("askName").with_handlers(handler_fn(|ctx| {
            let name = ctx.param("name").cloned().unwrap_or_default();
            ctx.model.set("name", name)?;
            Ok(TransitionSpec::to("die").tell("Exit.Bye").into())
        }));
        let machine = machine(vec![entry, ask_name]);

        let mut ctx = DialogContext::new(
            Some(Intent::new("NameIntent").with_param("name", "Ada")),
            "en-US",
        );
        ctx.set_state(Some("askName".to_string()));

        let transition = machine.run_transition(&mut ctx, &mut Vec::<Transition>::new()).await.unwrap();
        assert_eq!(transition.from, "askName");
        assert!(transition.terminated);
        assert_eq!(ctx.state(), None);
        assert_eq!(ctx.model.get::<String>("name").unwrap().as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn test_unhandled_state_and_fallback() {
        let entry = State::new("entry").with_handlers(StateHandlers::IntentFilter {
            intents: vec!["LaunchIntent".to_string()],
            handler: handler_fn(|_| Ok("Launch".into())),
        });

        let plain = machine(vec![State::new("entry").with_handlers(StateHandlers::IntentFilter {
            intents: vec!["LaunchIntent".to_string()],
            handler: handler_fn(|_| Ok("Launch".into())),
        })]);
        let err = plain
            .run_transition(&mut context("HelpIntent"), &mut Vec::<Transition>::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "HelpIntent went unhandled on entry state");

        let declines = unhandled_state_hook(|_, _| Box::pin(async { Ok(HandlerResult::Empty) }));
        let recovers = unhandled_state_hook(|_, state| {
            let path = format!("Unhandled.{state}");
            Box::pin(async move { Ok(HandlerResult::View(path)) })
        });
        let with_fallback = machine(vec![entry]).with_unhandled_state(vec![declines, recovers]);

        let transition = with_fallback
            .run_transition(&mut context("HelpIntent"), &mut Vec::<Transition>::new())
            .await
            .unwrap();
        assert_eq!(transition.view_paths(), ["Unhandled.entry"]);
    }

    #[tokio::test]
    async fn test_unknown_target_state() {
        let machine = machine(vec![State::new("entry").with_handlers(handler_fn(|_| {
            Ok(TransitionSpec::to("missing").say("A").into())
        }))]);

        let err = machine
            .run_transition(&mut context("LaunchIntent"), &mut Vec::<Transition>::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DialogError::UnknownState(ref name) if name == "missing"));
    }

    #[tokio::test]
    async fn test_loop_guard() {
        let machine = machine(vec![State::new("entry").with_handlers(handler_fn(|_| {
            Ok(TransitionSpec::to("entry").flow(Flow::Continue).into())
        }))]);

        let err = machine
            .run_transition(&mut context("LaunchIntent"), &mut Vec::<Transition>::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DialogError::TooManyTransitions(25)));
    }

    #[tokio::test]
    async fn test_before_state_changed_runs_per_state() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let hook = before_state_changed_hook(move |_, previous, state| {
            let expected_previous = state.name != "entry";
            assert_eq!(previous.is_some(), expected_previous);
            counter.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        });

        let entry = State::new("entry").with_handlers(handler(|_| {
            Box::pin(async { Ok(TransitionSpec::to("second").say("A").into()) })
        }));
        let second = State::new("second").with_handlers(HashMap::from([(
            DEFAULT_HANDLER_KEY.to_string(),
            handler_fn(|_| Ok(TransitionSpec::to("die").tell("B").into())),
        )]));
        let machine = machine(vec![entry, second]).with_before_state_changed(vec![hook]);

        machine
            .run_transition(&mut context("LaunchIntent"), &mut Vec::<Transition>::new())
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_handler_errors_propagate() {
        let machine = machine(vec![State::new("entry").with_handlers(handler_fn(|_| {
            Err(DialogError::handler("profile lookup failed"))
        }))]);

        let err = machine
            .run_transition(&mut context("LaunchIntent"), &mut Vec::<Transition>::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "profile lookup failed");
    }
}
