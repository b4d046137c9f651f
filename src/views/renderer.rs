//! Template renderer
//!
//! Resolves a dot path for the context's locale, then interpolates
//! `{identifier}` placeholders through the variable registry. Composite
//! templates are rendered recursively; any missing view or variable aborts
//! the whole render.

use futures::future::BoxFuture;
use regex::Regex;
use serde_json::{Map, Value};
use std::ops::Range;
use std::sync::{Arc, LazyLock};

use super::{VariableRegistry, ViewStore, pick_one, value_text};
use crate::errors::{DialogError, DialogResult};
use crate::events::DialogContext;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)\}").expect("placeholder pattern is valid"));

/// Bound on variables expanding into further placeholders
const MAX_RENDER_DEPTH: usize = 16;

/// Renders views and messages; cheap to clone and shared between requests
#[derive(Debug, Clone)]
pub struct Renderer {
    views: Arc<ViewStore>,
    variables: Arc<VariableRegistry>,
}

impl Renderer {
    pub fn new(views: Arc<ViewStore>, variables: Arc<VariableRegistry>) -> Self {
        Self { views, variables }
    }

    pub fn views(&self) -> &ViewStore {
        &self.views
    }

    pub fn variables(&self) -> &VariableRegistry {
        &self.variables
    }

    /// Resolve `path` for the context's locale and render it
    ///
    /// Arrays pick one element at random. A rendered object with an `ask`
    /// but no `reprompt` gets the ask text as its reprompt.
    pub async fn render_path(&self, path: &str, ctx: &DialogContext) -> DialogResult<Value> {
        let missing = || DialogError::MissingView {
            path: path.to_string(),
            locale: ctx.locale.clone(),
        };

        let leaf = self.views.lookup(&ctx.locale, path).ok_or_else(missing)?;
        let leaf = match leaf {
            Value::Array(items) => pick_one(items).ok_or_else(missing)?,
            other => other,
        };

        let mut rendered = self.render_message(leaf, ctx).await?;
        if let Value::Object(map) = &mut rendered {
            if let Some(ask) = map.get_mut("ask") {
                // Settle on one alternative so the reprompt repeats what was asked
                if let Value::Array(items) = ask {
                    if let Some(one) = pick_one(items).cloned() {
                        *ask = one;
                    }
                }
                let ask = ask.clone();
                map.entry("reprompt").or_insert(ask);
            }
        }
        Ok(rendered)
    }

    /// Interpolate every placeholder in `template`
    pub async fn render_message(&self, template: &Value, ctx: &DialogContext) -> DialogResult<Value> {
        self.render_value(template, ctx, 0).await
    }

    fn render_value<'a>(
        &'a self,
        template: &'a Value,
        ctx: &'a DialogContext,
        depth: usize,
    ) -> BoxFuture<'a, DialogResult<Value>> {
        Box::pin(async move {
            match template {
                Value::String(text) => self.render_string(text, ctx, depth).await,
                Value::Array(items) => {
                    let mut rendered = Vec::with_capacity(items.len());
                    for item in items {
                        rendered.push(self.render_value(item, ctx, depth).await?);
                    }
                    Ok(Value::Array(rendered))
                }
                Value::Object(map) => {
                    let mut rendered = Map::new();
                    for (key, value) in map {
                        rendered.insert(key.clone(), self.render_value(value, ctx, depth).await?);
                    }
                    Ok(Value::Object(rendered))
                }
                scalar => Ok(scalar.clone()),
            }
        })
    }

    async fn render_string(
        &self,
        text: &str,
        ctx: &DialogContext,
        depth: usize,
    ) -> DialogResult<Value> {
        let placeholders = placeholders(text);

        // A lone placeholder keeps the variable's structure
        if let [(span, name)] = placeholders.as_slice() {
            if span.start == 0 && span.end == text.len() {
                return self.resolve(name, ctx, depth).await;
            }
        }

        let mut output = String::with_capacity(text.len());
        let mut last = 0;
        for (span, name) in placeholders {
            output.push_str(&text[last..span.start]);
            let value = self.resolve(&name, ctx, depth).await?;
            output.push_str(&value_text(&value));
            last = span.end;
        }
        output.push_str(&text[last..]);

        Ok(Value::String(output))
    }

    async fn resolve(&self, name: &str, ctx: &DialogContext, depth: usize) -> DialogResult<Value> {
        let variable = self
            .variables
            .get(name)
            .ok_or_else(|| DialogError::MissingVariable(name.to_string()))?;

        if depth >= MAX_RENDER_DEPTH {
            return Err(DialogError::RenderDepthExceeded(name.to_string()));
        }

        let value = variable(ctx).await?;
        self.render_value(&value, ctx, depth + 1).await
    }
}

fn placeholders(text: &str) -> Vec<(Range<usize>, String)> {
    PLACEHOLDER
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let name = caps.get(1)?;
            Some((whole.range(), name.as_str().to_string()))
        })
        .collect()
}
