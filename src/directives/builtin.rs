//! Built-in directives
//!
//! - statement directives: [`Say`], [`SayText`], [`Ask`], [`Tell`], [`Reprompt`]
//! - single slot: [`Hint`], [`HomeCard`], [`BasicCard`]
//! - structural, screen only: [`Carousel`], [`List`], [`Table`]
//! - media: [`PlayAudio`] / [`StopAudio`] (never together), [`MediaResponse`]
//! - dialog management: [`DialogDelegate`], [`ElicitSlot`], [`ConfirmIntent`]
//! - [`EndSession`] and the catch-all [`RawDirective`]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::Directive;
use crate::aggregate::{AppliedDirective, Reply};
use crate::errors::{DialogError, DialogResult};
use crate::events::DialogContext;
use crate::value_objects::{Capabilities, ViewFlavor};
use crate::views::Renderer;

const CARD_GROUP: &str = "Card";
const AUDIO_PLAYER_GROUP: &str = "AudioPlayer";
const DIALOG_GROUP: &str = "Dialog";

async fn write_view(
    reply: &mut Reply,
    ctx: &DialogContext,
    renderer: &Renderer,
    path: &str,
    flavor: ViewFlavor,
) -> DialogResult<()> {
    let rendered = renderer.render_path(path, ctx).await?;
    reply.append_view(flavor, rendered)
}

/// Render a view path and append it as a statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Say {
    path: String,
}

impl Say {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Directive for Say {
    fn kind(&self) -> &str {
        "Say"
    }

    async fn write_to_reply(
        &self,
        reply: &mut Reply,
        ctx: &DialogContext,
        renderer: &Renderer,
    ) -> DialogResult<()> {
        write_view(reply, ctx, renderer, &self.path, ViewFlavor::Say).await
    }
}

/// Append literal text, interpolating placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SayText {
    text: String,
}

impl SayText {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl Directive for SayText {
    fn kind(&self) -> &str {
        "SayText"
    }

    async fn write_to_reply(
        &self,
        reply: &mut Reply,
        ctx: &DialogContext,
        renderer: &Renderer,
    ) -> DialogResult<()> {
        let rendered = renderer
            .render_message(&Value::String(self.text.clone()), ctx)
            .await?;
        reply.append_view(ViewFlavor::Say, rendered)
    }
}

/// Ask a question; the question doubles as reprompt unless one is set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ask {
    path: String,
}

impl Ask {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Directive for Ask {
    fn kind(&self) -> &str {
        "Ask"
    }

    async fn write_to_reply(
        &self,
        reply: &mut Reply,
        ctx: &DialogContext,
        renderer: &Renderer,
    ) -> DialogResult<()> {
        write_view(reply, ctx, renderer, &self.path, ViewFlavor::Ask).await
    }
}

/// Final statement; terminates the reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tell {
    path: String,
}

impl Tell {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Directive for Tell {
    fn kind(&self) -> &str {
        "Tell"
    }

    async fn write_to_reply(
        &self,
        reply: &mut Reply,
        ctx: &DialogContext,
        renderer: &Renderer,
    ) -> DialogResult<()> {
        write_view(reply, ctx, renderer, &self.path, ViewFlavor::Tell).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reprompt {
    path: String,
}

impl Reprompt {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Directive for Reprompt {
    fn kind(&self) -> &str {
        "Reprompt"
    }

    async fn write_to_reply(
        &self,
        reply: &mut Reply,
        ctx: &DialogContext,
        renderer: &Renderer,
    ) -> DialogResult<()> {
        write_view(reply, ctx, renderer, &self.path, ViewFlavor::Reprompt).await
    }
}

/// Suggested utterance shown on screen devices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hint {
    text: String,
}

impl Hint {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl Directive for Hint {
    fn kind(&self) -> &str {
        "Hint"
    }

    fn exclusivity_group(&self) -> Option<&str> {
        Some("Hint")
    }

    async fn write_to_reply(
        &self,
        reply: &mut Reply,
        ctx: &DialogContext,
        renderer: &Renderer,
    ) -> DialogResult<()> {
        let text = renderer
            .render_message(&Value::String(self.text.clone()), ctx)
            .await?;
        reply.add_directive(
            AppliedDirective::new("Hint", json!({ "type": "PlainText", "text": text }))
                .in_group("Hint"),
        )
    }
}

/// Card shown in the companion app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeCard {
    title: String,
    content: String,
    image_url: Option<String>,
}

impl HomeCard {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            image_url: None,
        }
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }
}

#[async_trait]
impl Directive for HomeCard {
    fn kind(&self) -> &str {
        "HomeCard"
    }

    fn exclusivity_group(&self) -> Option<&str> {
        Some(CARD_GROUP)
    }

    async fn write_to_reply(
        &self,
        reply: &mut Reply,
        ctx: &DialogContext,
        renderer: &Renderer,
    ) -> DialogResult<()> {
        let card_type = if self.image_url.is_some() { "Standard" } else { "Simple" };
        let card = renderer
            .render_message(
                &json!({
                    "type": card_type,
                    "title": self.title,
                    "content": self.content,
                    "image": self.image_url,
                }),
                ctx,
            )
            .await?;
        reply.add_directive(AppliedDirective::new("HomeCard", card).in_group(CARD_GROUP))
    }
}

/// On-screen card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCard {
    title: String,
    text: String,
    image_url: Option<String>,
}

impl BasicCard {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            image_url: None,
        }
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }
}

#[async_trait]
impl Directive for BasicCard {
    fn kind(&self) -> &str {
        "BasicCard"
    }

    fn exclusivity_group(&self) -> Option<&str> {
        Some(CARD_GROUP)
    }

    fn is_supported(&self, capabilities: &Capabilities) -> bool {
        capabilities.screen
    }

    async fn write_to_reply(
        &self,
        reply: &mut Reply,
        ctx: &DialogContext,
        renderer: &Renderer,
    ) -> DialogResult<()> {
        let card = renderer
            .render_message(
                &json!({ "title": self.title, "text": self.text, "image": self.image_url }),
                ctx,
            )
            .await?;
        reply.add_directive(AppliedDirective::new("BasicCard", card).in_group(CARD_GROUP))
    }
}

/// Entry of a carousel or list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    /// Selection key reported back when the item is chosen
    pub key: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl ListItem {
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            description: None,
            image_url: None,
        }
    }
}

async fn write_items(
    kind: &str,
    items: &[ListItem],
    title: Option<&str>,
    reply: &mut Reply,
    ctx: &DialogContext,
    renderer: &Renderer,
) -> DialogResult<()> {
    if items.len() < 2 {
        return Err(DialogError::DirectivePrecondition(format!(
            "{kind} requires at least 2 items"
        )));
    }

    let payload = renderer
        .render_message(&json!({ "title": title, "items": items }), ctx)
        .await?;
    reply.add_directive(AppliedDirective::new(kind, payload).in_group(kind))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Carousel {
    items: Vec<ListItem>,
}

impl Carousel {
    pub fn new(items: Vec<ListItem>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl Directive for Carousel {
    fn kind(&self) -> &str {
        "Carousel"
    }

    fn exclusivity_group(&self) -> Option<&str> {
        Some("Carousel")
    }

    fn is_supported(&self, capabilities: &Capabilities) -> bool {
        capabilities.screen
    }

    async fn write_to_reply(
        &self,
        reply: &mut Reply,
        ctx: &DialogContext,
        renderer: &Renderer,
    ) -> DialogResult<()> {
        write_items("Carousel", &self.items, None, reply, ctx, renderer).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct List {
    title: Option<String>,
    items: Vec<ListItem>,
}

impl List {
    pub fn new(items: Vec<ListItem>) -> Self {
        Self { title: None, items }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

#[async_trait]
impl Directive for List {
    fn kind(&self) -> &str {
        "List"
    }

    fn exclusivity_group(&self) -> Option<&str> {
        Some("List")
    }

    fn is_supported(&self, capabilities: &Capabilities) -> bool {
        capabilities.screen
    }

    async fn write_to_reply(
        &self,
        reply: &mut Reply,
        ctx: &DialogContext,
        renderer: &Renderer,
    ) -> DialogResult<()> {
        write_items("List", &self.items, self.title.as_deref(), reply, ctx, renderer).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }
}

#[async_trait]
impl Directive for Table {
    fn kind(&self) -> &str {
        "Table"
    }

    fn exclusivity_group(&self) -> Option<&str> {
        Some("Table")
    }

    fn is_supported(&self, capabilities: &Capabilities) -> bool {
        capabilities.screen
    }

    async fn write_to_reply(
        &self,
        reply: &mut Reply,
        ctx: &DialogContext,
        renderer: &Renderer,
    ) -> DialogResult<()> {
        if let Some(row) = self.rows.iter().find(|row| row.len() != self.columns.len()) {
            return Err(DialogError::DirectivePrecondition(format!(
                "Table row has {} cells but {} columns are declared",
                row.len(),
                self.columns.len()
            )));
        }

        let payload = renderer
            .render_message(&json!({ "columns": self.columns, "rows": self.rows }), ctx)
            .await?;
        reply.add_directive(AppliedDirective::new("Table", payload).in_group("Table"))
    }
}

/// Start streaming audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayAudio {
    url: String,
    token: String,
    offset_ms: u64,
}

impl PlayAudio {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            offset_ms: 0,
        }
    }

    pub fn with_offset(mut self, offset_ms: u64) -> Self {
        self.offset_ms = offset_ms;
        self
    }
}

#[async_trait]
impl Directive for PlayAudio {
    fn kind(&self) -> &str {
        "PlayAudio"
    }

    fn exclusivity_group(&self) -> Option<&str> {
        Some(AUDIO_PLAYER_GROUP)
    }

    fn is_supported(&self, capabilities: &Capabilities) -> bool {
        capabilities.audio
    }

    async fn write_to_reply(
        &self,
        reply: &mut Reply,
        _ctx: &DialogContext,
        _renderer: &Renderer,
    ) -> DialogResult<()> {
        reply.add_directive(
            AppliedDirective::new(
                "PlayAudio",
                json!({ "url": self.url, "token": self.token, "offsetInMilliseconds": self.offset_ms }),
            )
            .in_group(AUDIO_PLAYER_GROUP),
        )
    }
}

/// Stop any playing audio; never combined with [`PlayAudio`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopAudio;

#[async_trait]
impl Directive for StopAudio {
    fn kind(&self) -> &str {
        "StopAudio"
    }

    fn exclusivity_group(&self) -> Option<&str> {
        Some(AUDIO_PLAYER_GROUP)
    }

    fn is_supported(&self, capabilities: &Capabilities) -> bool {
        capabilities.audio
    }

    async fn write_to_reply(
        &self,
        reply: &mut Reply,
        _ctx: &DialogContext,
        _renderer: &Renderer,
    ) -> DialogResult<()> {
        reply.add_directive(
            AppliedDirective::new("StopAudio", Value::Null).in_group(AUDIO_PLAYER_GROUP),
        )
    }
}

/// Media playback that follows a spoken statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaResponse {
    url: String,
    name: String,
}

impl MediaResponse {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
        }
    }
}

#[async_trait]
impl Directive for MediaResponse {
    fn kind(&self) -> &str {
        "MediaResponse"
    }

    fn exclusivity_group(&self) -> Option<&str> {
        Some("Media")
    }

    fn is_supported(&self, capabilities: &Capabilities) -> bool {
        capabilities.audio
    }

    async fn write_to_reply(
        &self,
        reply: &mut Reply,
        _ctx: &DialogContext,
        _renderer: &Renderer,
    ) -> DialogResult<()> {
        if reply.statements().is_empty() {
            return Err(DialogError::DirectivePrecondition(
                "MediaResponse requires another simple response first".to_string(),
            ));
        }

        reply.add_directive(
            AppliedDirective::new(
                "MediaResponse",
                json!({ "mediaType": "AUDIO", "mediaObjects": [{ "name": self.name, "contentUrl": self.url }] }),
            )
            .in_group("Media"),
        )
    }
}

/// Hand slot filling back to the platform
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DialogDelegate {
    updated_intent: Option<Value>,
}

impl DialogDelegate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_updated_intent(mut self, intent: Value) -> Self {
        self.updated_intent = Some(intent);
        self
    }
}

#[async_trait]
impl Directive for DialogDelegate {
    fn kind(&self) -> &str {
        "DialogDelegate"
    }

    fn exclusivity_group(&self) -> Option<&str> {
        Some(DIALOG_GROUP)
    }

    async fn write_to_reply(
        &self,
        reply: &mut Reply,
        _ctx: &DialogContext,
        _renderer: &Renderer,
    ) -> DialogResult<()> {
        reply.add_directive(
            AppliedDirective::new("DialogDelegate", json!({ "updatedIntent": self.updated_intent }))
                .in_group(DIALOG_GROUP),
        )
    }
}

/// Ask the user for one slot value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElicitSlot {
    slot: String,
    path: String,
}

impl ElicitSlot {
    pub fn new(slot: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            slot: slot.into(),
            path: path.into(),
        }
    }
}

#[async_trait]
impl Directive for ElicitSlot {
    fn kind(&self) -> &str {
        "ElicitSlot"
    }

    fn exclusivity_group(&self) -> Option<&str> {
        Some(DIALOG_GROUP)
    }

    async fn write_to_reply(
        &self,
        reply: &mut Reply,
        ctx: &DialogContext,
        renderer: &Renderer,
    ) -> DialogResult<()> {
        write_view(reply, ctx, renderer, &self.path, ViewFlavor::Ask).await?;
        reply.add_directive(
            AppliedDirective::new(
                "ElicitSlot",
                json!({ "slotToElicit": self.slot, "intent": ctx.intent_name() }),
            )
            .in_group(DIALOG_GROUP),
        )
    }
}

/// Ask the user to confirm the whole intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmIntent {
    path: String,
}

impl ConfirmIntent {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Directive for ConfirmIntent {
    fn kind(&self) -> &str {
        "ConfirmIntent"
    }

    fn exclusivity_group(&self) -> Option<&str> {
        Some(DIALOG_GROUP)
    }

    async fn write_to_reply(
        &self,
        reply: &mut Reply,
        ctx: &DialogContext,
        renderer: &Renderer,
    ) -> DialogResult<()> {
        write_view(reply, ctx, renderer, &self.path, ViewFlavor::Ask).await?;
        reply.add_directive(
            AppliedDirective::new("ConfirmIntent", json!({ "intent": ctx.intent_name() }))
                .in_group(DIALOG_GROUP),
        )
    }
}

/// Force the session to end
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndSession;

#[async_trait]
impl Directive for EndSession {
    fn kind(&self) -> &str {
        "EndSession"
    }

    async fn write_to_reply(
        &self,
        reply: &mut Reply,
        _ctx: &DialogContext,
        _renderer: &Renderer,
    ) -> DialogResult<()> {
        reply.terminate();
        Ok(())
    }
}

/// Arbitrary structured directive, written as-is after interpolation
#[derive(Debug, Clone, PartialEq)]
pub struct RawDirective {
    kind: String,
    payload: Value,
    group: Option<String>,
    requires_screen: bool,
}

impl RawDirective {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            group: None,
            requires_screen: false,
        }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn screen_only(mut self) -> Self {
        self.requires_screen = true;
        self
    }
}

#[async_trait]
impl Directive for RawDirective {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn exclusivity_group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    fn is_supported(&self, capabilities: &Capabilities) -> bool {
        !self.requires_screen || capabilities.screen
    }

    async fn write_to_reply(
        &self,
        reply: &mut Reply,
        ctx: &DialogContext,
        renderer: &Renderer,
    ) -> DialogResult<()> {
        let payload = renderer.render_message(&self.payload, ctx).await?;
        let mut applied = AppliedDirective::new(self.kind.clone(), payload);
        applied.group = self.group.clone();
        reply.add_directive(applied)
    }
}
