//! Named view variables

use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::DialogResult;
use crate::events::DialogContext;

/// Async function producing a value for a `{placeholder}`
pub type Variable =
    Arc<dyn for<'a> Fn(&'a DialogContext) -> BoxFuture<'a, DialogResult<Value>> + Send + Sync>;

/// Wrap an async closure as a [`Variable`]
pub fn variable<F>(f: F) -> Variable
where
    F: for<'a> Fn(&'a DialogContext) -> BoxFuture<'a, DialogResult<Value>> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a synchronous closure as a [`Variable`]
pub fn variable_fn<F, V>(f: F) -> Variable
where
    F: Fn(&DialogContext) -> DialogResult<V> + Send + Sync + 'static,
    V: Into<Value>,
{
    variable(move |ctx| {
        let value: DialogResult<Value> = f(ctx).map(Into::into);
        Box::pin(async move { value })
    })
}

/// Read-only registry of variables, shared between requests
#[derive(Clone, Default)]
pub struct VariableRegistry {
    variables: HashMap<String, Variable>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `variable` under `name`, replacing any earlier one
    pub fn register(&mut self, name: impl Into<String>, variable: Variable) {
        self.variables.insert(name.into(), variable);
    }

    pub fn with(mut self, name: impl Into<String>, variable: Variable) -> Self {
        self.register(name, variable);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.variables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for VariableRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::Intent;
    use serde_json::json;

    #[tokio::test]
    async fn test_sync_and_async_variables() {
        let registry = VariableRegistry::new()
            .with("site", variable_fn(|_| Ok("example.org")))
            .with(
                "intent",
                variable(|ctx| {
                    Box::pin(async move { Ok(json!(ctx.intent_name().unwrap_or_default())) })
                }),
            );

        let ctx = DialogContext::new(Some(Intent::new("HelpIntent")), "en-US");

        let site = registry.get("site").unwrap();
        assert_eq!(site(&ctx).await.unwrap(), json!("example.org"));

        let intent = registry.get("intent").unwrap();
        assert_eq!(intent(&ctx).await.unwrap(), json!("HelpIntent"));

        assert_eq!(registry.names(), ["intent", "site"]);
        assert!(!registry.contains("missing"));
    }
}
