//! Dialog orchestrator
//!
//! [`DialogApp`] is the per-request glue: it builds the [`DialogContext`],
//! drives the [`StateMachine`], renders each transition's views, applies its
//! directives and returns one [`Reply`]. Any failure degrades to a fallback
//! reply; callers never see a raw error from [`DialogApp::execute`].
//!
//! ```ignore
//! let app = DialogApp::builder()
//!     .views(ViewStore::from_path(Path::new("views.json"))?)
//!     .on_state("entry", handler_fn(|_| Ok(TransitionSpec::to("die").tell("Exit.Bye").into())))
//!     .build()?;
//!
//! let reply = app.execute(DialogEvent::new("session-1", Intent::new("LaunchIntent"))).await;
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

use crate::aggregate::Reply;
use crate::config::DialogConfig;
use crate::directives::DirectivePipeline;
use crate::errors::{DialogError, DialogResult};
use crate::events::{DialogContext, DialogEvent};
use crate::handlers::{
    AfterStateChangedHook, BeforeStateChangedHook, ErrorHook, Handler, ReplyHook, RequestHook,
    StateHandlers, UnhandledStateHook,
};
use crate::session::SessionStore;
use crate::state_machine::{State, StateMachine, Transition, TransitionListener};
use crate::views::{Renderer, Variable, VariableRegistry, ViewStore};

/// Request level callbacks; the state level ones live on the [`StateMachine`]
#[derive(Default)]
struct RequestHooks {
    request_started: Vec<RequestHook>,
    session_started: Vec<RequestHook>,
    before_reply_sent: Vec<ReplyHook>,
    error: Vec<ErrorHook>,
}

/// Registration API for a [`DialogApp`]
#[derive(Default)]
pub struct DialogAppBuilder {
    config: DialogConfig,
    states: HashMap<String, State>,
    views: ViewStore,
    variables: VariableRegistry,
    hooks: RequestHooks,
    before_state_changed: Vec<BeforeStateChangedHook>,
    after_state_changed: Vec<AfterStateChangedHook>,
    unhandled_state: Vec<UnhandledStateHook>,
}

impl DialogAppBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: DialogConfig) -> Self {
        self.config = config;
        self
    }

    pub fn views(mut self, views: ViewStore) -> Self {
        self.views = views;
        self
    }

    pub fn variables(mut self, variables: VariableRegistry) -> Self {
        self.variables = variables;
        self
    }

    pub fn variable(mut self, name: impl Into<String>, variable: Variable) -> Self {
        self.variables.register(name, variable);
        self
    }

    fn state_mut(&mut self, name: String) -> &mut State {
        self.states
            .entry(name.clone())
            .or_insert_with(|| State::new(name))
    }

    /// Register handlers for a state; repeated registrations are merged
    pub fn on_state(mut self, name: impl Into<String>, handlers: impl Into<StateHandlers>) -> Self {
        self.state_mut(name.into()).register(handlers);
        self
    }

    /// Register one handler for a single intent of a state
    pub fn on_intent(
        self,
        name: impl Into<String>,
        intent: impl Into<String>,
        handler: Handler,
    ) -> Self {
        self.on_intents(name, [intent], handler)
    }

    /// Register one handler for several intents of a state
    pub fn on_intents<I, S>(mut self, name: impl Into<String>, intents: I, handler: Handler) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let handlers = StateHandlers::IntentFilter {
            intents: intents.into_iter().map(Into::into).collect(),
            handler,
        };
        self.state_mut(name.into()).register(handlers);
        self
    }

    /// Mark a state terminal; a run reaching it ends the session
    pub fn terminal_state(mut self, name: impl Into<String>) -> Self {
        self.state_mut(name.into()).is_terminal = true;
        self
    }

    pub fn on_request_started(mut self, hook: RequestHook) -> Self {
        self.hooks.request_started.push(hook);
        self
    }

    /// Runs after `on_request_started`, only for new sessions
    pub fn on_session_started(mut self, hook: RequestHook) -> Self {
        self.hooks.session_started.push(hook);
        self
    }

    pub fn on_before_state_changed(mut self, hook: BeforeStateChangedHook) -> Self {
        self.before_state_changed.push(hook);
        self
    }

    pub fn on_after_state_changed(mut self, hook: AfterStateChangedHook) -> Self {
        self.after_state_changed.push(hook);
        self
    }

    /// Fallbacks for intents nothing handled, tried in registration order
    pub fn on_unhandled_state(mut self, hook: UnhandledStateHook) -> Self {
        self.unhandled_state.push(hook);
        self
    }

    pub fn on_before_reply_sent(mut self, hook: ReplyHook) -> Self {
        self.hooks.before_reply_sent.push(hook);
        self
    }

    /// Custom failure replies, tried in registration order
    pub fn on_error(mut self, hook: ErrorHook) -> Self {
        self.hooks.error.push(hook);
        self
    }

    /// Validate the registration and build the app
    pub fn build(self) -> DialogResult<DialogApp> {
        self.config.validate()?;

        let machine = StateMachine::new(&self.config, self.states.into_values())?
            .with_before_state_changed(self.before_state_changed)
            .with_after_state_changed(self.after_state_changed)
            .with_unhandled_state(self.unhandled_state);

        let renderer = Renderer::new(Arc::new(self.views), Arc::new(self.variables));

        info!(
            entry = %machine.entry_state(),
            terminal = %machine.terminal_state(),
            locales = ?renderer.views().locales(),
            "dialog app built"
        );

        Ok(DialogApp {
            config: Arc::new(self.config),
            machine: Arc::new(machine),
            pipeline: DirectivePipeline::new(renderer.clone()),
            renderer,
            hooks: Arc::new(self.hooks),
        })
    }
}

/// The orchestrator; cheap to clone and shared between requests
#[derive(Clone)]
pub struct DialogApp {
    config: Arc<DialogConfig>,
    machine: Arc<StateMachine>,
    renderer: Renderer,
    pipeline: DirectivePipeline,
    hooks: Arc<RequestHooks>,
}

impl DialogApp {
    pub fn builder() -> DialogAppBuilder {
        DialogAppBuilder::new()
    }

    pub fn config(&self) -> &DialogConfig {
        &self.config
    }

    pub fn state_machine(&self) -> &StateMachine {
        &self.machine
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Handle one request with session state carried in its attributes
    pub async fn execute(&self, event: DialogEvent) -> Reply {
        let mut ctx = DialogContext::from_event(event, &self.config.default_locale);
        self.process(&mut ctx).await
    }

    /// Handle one request with session state kept in `store`
    ///
    /// A terminated reply removes the session; otherwise the next state
    /// and model are saved. Only store failures surface as errors.
    pub async fn execute_with_store(
        &self,
        store: &dyn SessionStore,
        event: DialogEvent,
    ) -> DialogResult<Reply> {
        let mut ctx = DialogContext::from_event(event, &self.config.default_locale);
        if let Some(session) = store.load(&ctx.session_id).await? {
            ctx.restore(session);
            ctx.new_session = false;
        }

        let reply = self.process(&mut ctx).await;

        if reply.is_terminated() {
            store.remove(&ctx.session_id).await?;
        } else {
            store.save(&ctx.session_id, ctx.session_data()).await?;
        }
        Ok(reply)
    }

    async fn process(&self, ctx: &mut DialogContext) -> Reply {
        info!(
            request_id = %ctx.request_id,
            session_id = %ctx.session_id,
            intent = ?ctx.intent_name(),
            state = ?ctx.state(),
            "handling request"
        );

        match self.run(ctx).await {
            Ok(reply) => reply,
            Err(err) => self.recover(ctx, err).await,
        }
    }

    async fn run(&self, ctx: &mut DialogContext) -> DialogResult<Reply> {
        for hook in &self.hooks.request_started {
            hook(ctx).await?;
        }
        if ctx.new_session {
            for hook in &self.hooks.session_started {
                hook(ctx).await?;
            }
        }

        let mut assembler = ReplyAssembler::new(&self.renderer, &self.pipeline);
        let last = self.machine.run_transition(ctx, &mut assembler).await?;

        let mut reply = assembler.reply;
        reply.set_session_attributes(ctx.session_data().to_attributes());

        for hook in &self.hooks.before_reply_sent {
            hook(&*ctx, &mut reply).await?;
        }

        info!(
            request_id = %ctx.request_id,
            steps = assembler.steps,
            last_state = %last.from,
            next_state = ?ctx.state(),
            terminated = reply.is_terminated(),
            "reply ready"
        );
        Ok(reply)
    }

    async fn recover(&self, ctx: &DialogContext, err: DialogError) -> Reply {
        error!(
            request_id = %ctx.request_id,
            kind = ?err.kind(),
            error = %err,
            "request failed, sending fallback reply"
        );

        for hook in &self.hooks.error {
            if let Some(reply) = hook(ctx, &err).await {
                if !reply.is_empty() {
                    return reply;
                }
            }
        }

        Reply::fallback(self.config.fallback_message.clone())
    }
}

impl std::fmt::Debug for DialogApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogApp")
            .field("config", &self.config)
            .field("entry", &self.machine.entry_state())
            .field("renderer", &self.renderer)
            .finish()
    }
}

/// Writes each transition step into the request's reply as the engine runs
struct ReplyAssembler<'a> {
    renderer: &'a Renderer,
    pipeline: &'a DirectivePipeline,
    reply: Reply,
    steps: usize,
}

impl<'a> ReplyAssembler<'a> {
    fn new(renderer: &'a Renderer, pipeline: &'a DirectivePipeline) -> Self {
        Self {
            renderer,
            pipeline,
            reply: Reply::new(),
            steps: 0,
        }
    }
}

#[async_trait]
impl<'a> TransitionListener for ReplyAssembler<'a> {
    async fn on_transition(
        &mut self,
        ctx: &DialogContext,
        transition: &Transition,
    ) -> DialogResult<()> {
        self.steps += 1;

        if let Some(reply) = &transition.reply {
            self.reply.merge(reply.clone())?;
        }

        for view in &transition.views {
            let rendered = self.renderer.render_path(&view.path, ctx).await?;
            self.reply.append_view(view.flavor, rendered)?;
        }

        self.pipeline
            .apply_directives(&transition.directives, &mut self.reply, ctx)
            .await?;

        if transition.terminated {
            self.reply.terminate();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{TransitionSpec, handler_fn};
    use crate::value_objects::Intent;
    use serde_json::json;

    fn views() -> ViewStore {
        ViewStore::from_value(json!({
            "en-US": {
                "Launch": { "Ask": "What is your name?" },
                "Exit": { "Bye": "Goodbye" }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_build_requires_entry_state() {
        let err = DialogApp::builder()
            .on_state("other", handler_fn(|_| Ok("Exit.Bye".into())))
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "State machine must have a `entry` state");

        let err = DialogApp::builder().build().unwrap_err();
        assert!(matches!(err, DialogError::EmptyStateTable));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let config = DialogConfig {
            max_transitions: 0,
            ..DialogConfig::default()
        };
        let err = DialogApp::builder()
            .config(config)
            .on_state("entry", handler_fn(|_| Ok("Exit.Bye".into())))
            .build()
            .unwrap_err();
        assert!(matches!(err, DialogError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn test_yield_keeps_session_open() {
        let app = DialogApp::builder()
            .views(views())
            .on_state(
                "entry",
                handler_fn(|_| Ok(TransitionSpec::to("askName").ask("Launch.Ask").into())),
            )
            .on_state("askName", handler_fn(|_| Ok("Exit.Bye".into())))
            .build()
            .unwrap();

        let reply = app
            .execute(DialogEvent::new("s1", Intent::new("LaunchIntent")))
            .await;

        assert_eq!(reply.statements(), ["What is your name?"]);
        assert_eq!(reply.reprompt(), Some("What is your name?"));
        assert!(!reply.is_terminated());
        assert_eq!(reply.session_attributes()["state"], json!("askName"));
    }

    #[tokio::test]
    async fn test_missing_intent_degrades_to_fallback() {
        let app = DialogApp::builder()
            .views(views())
            .on_state("entry", handler_fn(|_| Ok("Exit.Bye".into())))
            .build()
            .unwrap();

        let mut event = DialogEvent::new("s1", Intent::new("LaunchIntent"));
        event.intent = None;
        let reply = app.execute(event).await;

        assert_eq!(reply.statements(), ["Sorry, something went wrong."]);
        assert!(reply.is_terminated());
    }
}
