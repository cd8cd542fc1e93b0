//! Session-scoped message history
//!
//! This module owns the conversation state of the process:
//!
//! - [`MessageLog`] - append-only, ordered messages of one session
//! - [`Session`] - one store entry; its log sits behind an async mutex that
//!   serializes every read-append-trim-invoke-append cycle on that session
//! - [`SessionStore`] - maps session IDs to sessions, creating each at most once
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  SessionStore                                        │
//! │                                                      │
//! │  RwLock<HashMap<String, Arc<Session>>>               │
//! │    "chat1" ──► Session { Mutex<MessageLog> }         │
//! │    "chat2" ──► Session { Mutex<MessageLog> }         │
//! │                                                      │
//! │  • map lock held only to look up / insert entries    │
//! │  • session lock held for a whole pipeline call       │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! The map lock is never held across an `.await`, so sessions never wait on
//! each other. History is never removed; trimming works on snapshots.
//!
//! # Example
//!
//! ```rust
//! use memory_core::history::SessionStore;
//! use memory_core::messages::Message;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let store = SessionStore::new();
//! let session = store.get_or_create("chat1");
//!
//! session.lock().await.append(Message::human("hi"));
//! assert_eq!(store.get_or_create("chat1").snapshot().await.len(), 1);
//! # });
//! ```

use crate::messages::Message;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

/// Ordered, append-only message history of one session
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message at the end
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Current history as an owned copy; later appends do not affect it
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Borrow the messages in order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Most recent message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// One conversation thread
#[derive(Debug)]
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    log: Mutex<MessageLog>,
}

impl Session {
    fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            log: Mutex::new(MessageLog::new()),
        }
    }

    /// Session identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// When the session was first accessed
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Exclusive access to the log for the duration of the guard
    ///
    /// Other callers on this session wait; other sessions are unaffected.
    pub async fn lock(&self) -> MutexGuard<'_, MessageLog> {
        self.log.lock().await
    }

    /// Full, untrimmed history
    pub async fn snapshot(&self) -> Vec<Message> {
        self.log.lock().await.snapshot()
    }

    /// Number of messages in the history
    pub async fn len(&self) -> usize {
        self.log.lock().await.len()
    }

    /// Whether the history is empty
    pub async fn is_empty(&self) -> bool {
        self.log.lock().await.is_empty()
    }
}

/// Process-wide mapping from session ID to session
///
/// Any string is a valid ID, including the empty string.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session for `id`, creating it on first access
    ///
    /// Concurrent first accesses for the same ID all receive the same session.
    pub fn get_or_create(&self, id: &str) -> Arc<Session> {
        if let Some(session) = self.sessions.read().get(id) {
            return Arc::clone(session);
        }

        let mut sessions = self.sessions.write();
        let session = sessions.entry(id.to_string()).or_insert_with(|| {
            info!(session_id = %id, "Created session");
            Arc::new(Session::new(id))
        });
        Arc::clone(session)
    }

    /// Return the session for `id` without creating it
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    /// Whether a session exists for `id`
    pub fn contains(&self, id: &str) -> bool {
        self.sessions.read().contains_key(id)
    }

    /// IDs of all sessions, sorted
    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of sessions
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether no session has been created yet
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
