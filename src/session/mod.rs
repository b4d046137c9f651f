//! Session persistence
//!
//! Platforms that round-trip session attributes need no store at all. For
//! the rest, [`SessionStore`] keeps one [`SessionData`] per session id
//! between requests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::errors::{DialogError, DialogResult};
use crate::value_objects::SessionData;

/// Storage seam for per-session dialog state
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stored session, `None` when the id is unknown
    async fn load(&self, session_id: &str) -> DialogResult<Option<SessionData>>;

    async fn save(&self, session_id: &str, session: SessionData) -> DialogResult<()>;

    /// Forget a session; unknown ids are ignored
    async fn remove(&self, session_id: &str) -> DialogResult<()>;
}

/// Process-local store, optionally capped at a number of live sessions
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionData>>>,
    max_sessions: Option<usize>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse new sessions once `max` are stored; existing ones can still be updated
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = Some(max);
        self
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> DialogResult<Option<SessionData>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned())
    }

    async fn save(&self, session_id: &str, session: SessionData) -> DialogResult<()> {
        let mut sessions = self.sessions.write().await;
        if let Some(max) = self.max_sessions {
            if sessions.len() >= max && !sessions.contains_key(session_id) {
                return Err(DialogError::Session(format!(
                    "limit of {max} sessions reached, cannot store {session_id}"
                )));
            }
        }
        sessions.insert(session_id.to_string(), session);
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> DialogResult<()> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }
}
