//! Directive pipeline
//!
//! Directives are small units of work that write a response fragment to
//! the reply. The pipeline applies them strictly in declaration order,
//! since later directives may depend on what earlier ones wrote, and
//! enforces the cross-directive rules:
//! - at most one directive per exclusivity group
//! - directives the surface cannot present are skipped silently

pub mod builtin;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::aggregate::Reply;
use crate::errors::{DialogError, DialogResult};
use crate::events::DialogContext;
use crate::value_objects::Capabilities;
use crate::views::Renderer;

pub use builtin::{
    Ask, BasicCard, Carousel, ConfirmIntent, DialogDelegate, ElicitSlot, EndSession, Hint,
    HomeCard, List, ListItem, MediaResponse, PlayAudio, RawDirective, Reprompt, Say, SayText,
    StopAudio, Table, Tell,
};

/// A response fragment writer
///
/// Configuration is captured at construction; instances are created per
/// handler invocation and dropped after being applied.
#[async_trait]
pub trait Directive: Send + Sync {
    /// Kind name, e.g. `Hint`
    fn kind(&self) -> &str;

    /// Group of directives that may not coexist in one reply
    fn exclusivity_group(&self) -> Option<&str> {
        None
    }

    /// Whether the requesting surface can present this directive
    fn is_supported(&self, _capabilities: &Capabilities) -> bool {
        true
    }

    /// Write this directive's fragment to the reply
    async fn write_to_reply(
        &self,
        reply: &mut Reply,
        ctx: &DialogContext,
        renderer: &Renderer,
    ) -> DialogResult<()>;
}

/// Applies directives to a reply in order
#[derive(Debug, Clone)]
pub struct DirectivePipeline {
    renderer: Renderer,
}

impl DirectivePipeline {
    pub fn new(renderer: Renderer) -> Self {
        Self { renderer }
    }

    /// Apply `directives` one after another; the first failure aborts the rest
    pub async fn apply_directives(
        &self,
        directives: &[Arc<dyn Directive>],
        reply: &mut Reply,
        ctx: &DialogContext,
    ) -> DialogResult<()> {
        for directive in directives {
            if !directive.is_supported(&ctx.capabilities) {
                debug!(kind = directive.kind(), "skipping directive the surface cannot present");
                continue;
            }

            if let Some(group) = directive.exclusivity_group() {
                if reply.has_group(group) {
                    return Err(DialogError::DuplicateDirective(group.to_string()));
                }
            }

            directive.write_to_reply(reply, ctx, &self.renderer).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::Intent;
    use crate::views::{VariableRegistry, ViewStore};
    use serde_json::json;

    fn pipeline() -> DirectivePipeline {
        let views = ViewStore::from_value(json!({
            "en-US": {
                "Launch": { "Say": "Welcome" },
                "Ask": { "Name": "What is your name?" },
                "Exit": { "Bye": "Goodbye" }
            }
        }))
        .unwrap();
        DirectivePipeline::new(Renderer::new(
            Arc::new(views),
            Arc::new(VariableRegistry::new()),
        ))
    }

    fn context(capabilities: Capabilities) -> DialogContext {
        let mut ctx = DialogContext::new(Some(Intent::new("LaunchIntent")), "en-US");
        ctx.capabilities = capabilities;
        ctx
    }

    #[tokio::test]
    async fn test_applies_in_declaration_order() {
        let directives: Vec<Arc<dyn Directive>> = vec![
            Arc::new(Say::new("Launch.Say")),
            Arc::new(Ask::new("Ask.Name")),
            Arc::new(Hint::new("my name is Ada")),
        ];

        let mut reply = Reply::new();
        pipeline()
            .apply_directives(&directives, &mut reply, &context(Capabilities::voice_only()))
            .await
            .unwrap();

        assert_eq!(reply.statements(), ["Welcome", "What is your name?"]);
        assert_eq!(reply.reprompt(), Some("What is your name?"));
        assert!(reply.directive("Hint").is_some());
    }

    #[tokio::test]
    async fn test_duplicate_group_stops_before_next_directive() {
        let directives: Vec<Arc<dyn Directive>> = vec![
            Arc::new(Hint::new("first")),
            Arc::new(Hint::new("second")),
            Arc::new(Say::new("Launch.Say")),
        ];

        let mut reply = Reply::new();
        let err = pipeline()
            .apply_directives(&directives, &mut reply, &context(Capabilities::voice_only()))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "At most one Hint directive can be specified in a response"
        );
        assert!(reply.statements().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_directives_are_skipped() {
        let directives: Vec<Arc<dyn Directive>> = vec![
            Arc::new(BasicCard::new("Title", "Body")),
            Arc::new(Say::new("Launch.Say")),
        ];

        let mut reply = Reply::new();
        pipeline()
            .apply_directives(&directives, &mut reply, &context(Capabilities::voice_only()))
            .await
            .unwrap();
        assert!(reply.directive("BasicCard").is_none());
        assert_eq!(reply.statements(), ["Welcome"]);

        let mut reply = Reply::new();
        pipeline()
            .apply_directives(&directives, &mut reply, &context(Capabilities::all()))
            .await
            .unwrap();
        assert!(reply.directive("BasicCard").is_some());
    }

    #[tokio::test]
    async fn test_media_response_requires_statement() {
        let media: Vec<Arc<dyn Directive>> = vec![Arc::new(MediaResponse::new(
            "https://example.org/song.mp3",
            "Song",
        ))];

        let mut reply = Reply::new();
        let err = pipeline()
            .apply_directives(&media, &mut reply, &context(Capabilities::voice_only()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "MediaResponse requires another simple response first");

        let mut reply = Reply::new();
        let with_statement: Vec<Arc<dyn Directive>> = vec![
            Arc::new(Say::new("Launch.Say")),
            media[0].clone(),
        ];
        pipeline()
            .apply_directives(&with_statement, &mut reply, &context(Capabilities::voice_only()))
            .await
            .unwrap();
        assert!(reply.directive("MediaResponse").is_some());
    }
}
