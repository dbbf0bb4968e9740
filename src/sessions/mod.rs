use crate::agents::{Conversation, HotelAgent, Turn};

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// Chat Session
// ============================================================================

/// One user's dialogue with the hotel agent.
pub struct ChatSession {
    agent: Arc<HotelAgent>,
    conversation: Conversation,
}

impl ChatSession {
    pub fn new(agent: Arc<HotelAgent>) -> Self {
        Self {
            agent,
            conversation: Conversation::new(),
        }
    }

    /// Send a user message and return the assistant's reply.
    pub async fn chat(&mut self, text: &str) -> String {
        self.agent.respond(&mut self.conversation, text).await
    }

    /// Clear the conversation history.
    pub fn reset(&mut self) {
        self.conversation.reset();
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }
}

// ============================================================================
// Session Handle
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_key: String,
    pub turns: usize,
    pub created_at: String,
    pub updated_at: String,
}

/// A handle to a single session's data.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    info: parking_lot::RwLock<SessionInfo>,
    session: tokio::sync::Mutex<ChatSession>,
}

impl SessionHandle {
    fn new(key: &str, agent: Arc<HotelAgent>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            inner: Arc::new(SessionInner {
                info: parking_lot::RwLock::new(SessionInfo {
                    session_key: key.to_string(),
                    turns: 0,
                    created_at: now.clone(),
                    updated_at: now,
                }),
                session: tokio::sync::Mutex::new(ChatSession::new(agent)),
            }),
        }
    }

    /// Run one turn. Turns on the same session are processed one at a time.
    pub async fn chat(&self, text: &str) -> String {
        let mut session = self.inner.session.lock().await;
        let reply = session.chat(text).await;
        self.touch(session.conversation().len());
        reply
    }

    pub async fn reset(&self) {
        let mut session = self.inner.session.lock().await;
        session.reset();
        self.touch(0);
    }

    /// A copy of the conversation so far.
    pub async fn history(&self) -> Vec<Turn> {
        self.inner.session.lock().await.conversation().turns().to_vec()
    }

    /// Get a snapshot of the session info.
    pub fn info(&self) -> SessionInfo {
        self.inner.info.read().clone()
    }

    fn touch(&self, turns: usize) {
        let mut info = self.inner.info.write();
        info.turns = turns;
        info.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

// ============================================================================
// Session Store
// ============================================================================

/// In-memory sessions keyed by session key. Nothing outlives the process.
pub struct SessionStore {
    sessions: DashMap<String, SessionHandle>,
    agent: Arc<HotelAgent>,
}

impl SessionStore {
    pub fn new(agent: Arc<HotelAgent>) -> Self {
        Self {
            sessions: DashMap::new(),
            agent,
        }
    }

    /// List all active sessions.
    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        self.sessions
            .iter()
            .map(|entry| entry.value().info())
            .collect()
    }

    pub fn get_session(&self, key: &str) -> Option<SessionHandle> {
        self.sessions.get(key).map(|entry| entry.value().clone())
    }

    /// Return the number of active sessions.
    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// Delete a session by its key.
    pub fn delete_session(&self, key: &str) -> bool {
        self.sessions.remove(key).is_some()
    }

    /// Get an existing session or create a new one for the given key.
    pub fn get_or_create_session(&self, key: &str) -> SessionHandle {
        self.sessions
            .entry(key.to_string())
            .or_insert_with(|| {
                debug!(session_key = key, "session created");
                SessionHandle::new(key, self.agent.clone())
            })
            .clone()
    }

    /// Run one turn on the session for `key`, creating it if needed.
    pub async fn chat(&self, key: &str, text: &str) -> String {
        self.get_or_create_session(key).chat(text).await
    }
}
