//! Shared fixtures for the integration tests

#![allow(dead_code)]

use cim_dialog_flow::{DialogContext, Intent, ViewStore};
use serde_json::json;

/// Install a test subscriber once per test binary
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn views() -> ViewStore {
    ViewStore::from_value(json!({
        "en-US": {
            "translation": {
                "Launch": {
                    "Welcome": "Welcome to the demo.",
                    "AskName": "What is your name?"
                },
                "Question": { "Ask": { "ask": "What time is it?" } },
                "Greet": { "Name": "Nice to meet you, {name}." },
                "Help": { "Unhandled": "Sorry, I did not get that." },
                "Exit": { "Bye": "Goodbye" },
                "Random": ["Random1", "Random2", "Random3", "Random4"],
                "Choice": { "say": ["Hi there", "Hello"] },
                "Plain": { "say": "Nothing to see", "card": { "title": "Static" } }
            }
        },
        "de-DE": {
            "Exit": { "Bye": "Tschüss" }
        }
    }))
    .expect("fixture views are valid")
}

pub fn context(intent: &str) -> DialogContext {
    DialogContext::new(Some(Intent::new(intent)), "en-US")
}
