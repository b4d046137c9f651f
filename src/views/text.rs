//! Turning rendered values into spoken text

use rand::seq::SliceRandom;
use serde_json::Value;

/// One of `items` at random; arrays in views are sets of alternatives
pub(crate) fn pick_one(items: &[Value]) -> Option<&Value> {
    items.choose(&mut rand::thread_rng())
}

/// Text of a rendered value, used both for placeholders and statements
///
/// Arrays pick one alternative; `null` and empty arrays are empty text.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        Value::Array(items) => pick_one(items).map(value_text).unwrap_or_default(),
        other => other.to_string(),
    }
}
