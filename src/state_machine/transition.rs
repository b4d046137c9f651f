//! Normalized transition record
//!
//! Every handler result, whatever its shape, goes through [`normalize`]
//! exactly once. Precedence:
//! - `to` is authoritative for the next state; when absent it is the terminal state
//! - an explicit `flow` wins; otherwise `tell` implies terminate, `ask` implies yield,
//!   and anything else continues
//! - views and directives keep their declaration order and are always applied

use std::sync::Arc;

use crate::aggregate::Reply;
use crate::directives::Directive;
use crate::errors::{DialogError, DialogResult};
use crate::handlers::{HandlerResult, TransitionSpec};
use crate::value_objects::{Flow, ViewFlavor, ViewRef};

/// Outcome of one state-machine step
#[derive(Clone)]
pub struct Transition {
    /// State whose handler produced this transition
    pub from: String,
    /// Next state
    pub to: Option<String>,
    pub views: Vec<ViewRef>,
    pub directives: Vec<Arc<dyn Directive>>,
    pub flow: Flow,
    /// Set when the target is terminal or the flow terminates
    pub terminated: bool,
    /// Reply returned directly by the handler
    pub reply: Option<Reply>,
}

impl Transition {
    /// Whether the run stops after this step
    pub fn stops(&self) -> bool {
        self.terminated || self.flow != Flow::Continue
    }

    /// Declared view paths in order
    pub fn view_paths(&self) -> Vec<&str> {
        self.views.iter().map(|view| view.path.as_str()).collect()
    }
}

impl std::fmt::Debug for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transition")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("views", &self.views)
            .field(
                "directives",
                &self.directives.iter().map(|d| d.kind()).collect::<Vec<_>>(),
            )
            .field("flow", &self.flow)
            .field("terminated", &self.terminated)
            .field("reply", &self.reply)
            .finish()
    }
}

/// Normalize a handler result produced in state `from`
///
/// `is_terminal` answers whether a registered state is terminal and
/// `None` for names that are not registered.
pub fn normalize(
    from: &str,
    intent: &str,
    result: HandlerResult,
    terminal_state: &str,
    is_terminal: impl Fn(&str) -> Option<bool>,
) -> DialogResult<Transition> {
    let unhandled = || DialogError::UnhandledState {
        intent: intent.to_string(),
        state: from.to_string(),
    };
    if result.is_empty() {
        return Err(unhandled());
    }

    let spec = match result {
        HandlerResult::Empty => return Err(unhandled()),
        HandlerResult::View(path) => TransitionSpec::new().reply(path),
        HandlerResult::Reply(reply) => {
            return finish(
                from,
                TransitionSpec::new(),
                Some(reply),
                terminal_state,
                is_terminal,
            );
        }
        HandlerResult::Transition(spec) => spec,
    };

    finish(from, spec, None, terminal_state, is_terminal)
}

fn finish(
    from: &str,
    spec: TransitionSpec,
    reply: Option<Reply>,
    terminal_state: &str,
    is_terminal: impl Fn(&str) -> Option<bool>,
) -> DialogResult<Transition> {
    let flow = spec.flow.unwrap_or_else(|| {
        if spec.declares(ViewFlavor::Tell) {
            Flow::Terminate
        } else if spec.declares(ViewFlavor::Ask) {
            Flow::Yield
        } else {
            Flow::Continue
        }
    });

    let to = spec.to.unwrap_or_else(|| terminal_state.to_string());
    let target_terminal = is_terminal(&to).ok_or_else(|| DialogError::UnknownState(to.clone()))?;

    Ok(Transition {
        from: from.to_string(),
        to: Some(to),
        views: spec.views,
        directives: spec.directives,
        flow,
        terminated: target_terminal || flow == Flow::Terminate,
        reply,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<bool> {
        match name {
            "entry" | "askName" => Some(false),
            "die" => Some(true),
            _ => None,
        }
    }

    #[test]
    fn test_bare_view_defaults_to_terminal() {
        let transition = normalize("entry", "LaunchIntent", "Exit.Bye".into(), "die", lookup).unwrap();

        assert_eq!(transition.to.as_deref(), Some("die"));
        assert_eq!(transition.view_paths(), ["Exit.Bye"]);
        assert!(transition.terminated);
        assert!(transition.stops());
    }

    #[test]
    fn test_flow_inference() {
        let ask = normalize(
            "entry",
            "LaunchIntent",
            TransitionSpec::to("askName").ask("Ask.Name").into(),
            "die",
            lookup,
        )
        .unwrap();
        assert_eq!(ask.flow, Flow::Yield);
        assert!(!ask.terminated);

        let tell = normalize(
            "askName",
            "NameIntent",
            TransitionSpec::to("askName").tell("Exit.Bye").into(),
            "die",
            lookup,
        )
        .unwrap();
        assert_eq!(tell.flow, Flow::Terminate);
        assert!(tell.terminated);

        let cont = normalize(
            "entry",
            "LaunchIntent",
            TransitionSpec::to("askName").say("Hello").into(),
            "die",
            lookup,
        )
        .unwrap();
        assert_eq!(cont.flow, Flow::Continue);
        assert!(!cont.stops());
    }

    #[test]
    fn test_explicit_flow_wins() {
        let transition = normalize(
            "entry",
            "LaunchIntent",
            TransitionSpec::to("askName")
                .ask("Ask.Name")
                .flow(Flow::Continue)
                .into(),
            "die",
            lookup,
        )
        .unwrap();
        assert_eq!(transition.flow, Flow::Continue);
    }

    #[test]
    fn test_unknown_target() {
        let err = normalize(
            "entry",
            "LaunchIntent",
            TransitionSpec::to("nowhere").into(),
            "die",
            lookup,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Unknown state nowhere");
    }

    #[test]
    fn test_empty_result_is_unhandled() {
        let err = normalize("entry", "HelpIntent", HandlerResult::Empty, "die", lookup).unwrap_err();
        assert!(matches!(err, DialogError::UnhandledState { .. }));
        let message = err.to_string();
        assert!(message.contains("HelpIntent"));
        assert!(message.contains("entry"));

        for empty in [HandlerResult::from(""), TransitionSpec::new().into()] {
            let err = normalize("askName", "NoIntent", empty, "die", lookup).unwrap_err();
            assert_eq!(err.to_string(), "NoIntent went unhandled on askName state");
        }
    }
}
