//! Keyed persistence of debate sessions.
//!
//! The store hands out per-session handles guarded by their own mutex; a
//! caller holds the lock for the whole duration of a turn, which is what
//! serializes turns per session. Turns on different sessions proceed
//! independently.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::DebateError;
use crate::session::DebateSession;

/// A locked handle to one stored session.
pub type SessionHandle = Arc<Mutex<DebateSession>>;

/// Narrow persistence interface the engine needs: get/put/delete by id.
/// Implementations must return the same handle for the same id so the
/// per-entry lock actually excludes concurrent turns.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put(&self, session: DebateSession) -> SessionHandle;

    async fn get(&self, session_id: &str) -> Result<SessionHandle, DebateError>;

    async fn delete(&self, session_id: &str) -> Result<(), DebateError>;
}

/// In-process store: a map of independently locked entries. Eviction policy
/// is left to the deployment; nothing here expires sessions.
#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn put(&self, session: DebateSession) -> SessionHandle {
        let id = session.session_id().to_string();
        let handle = Arc::new(Mutex::new(session));
        self.sessions.lock().await.insert(id, Arc::clone(&handle));
        handle
    }

    async fn get(&self, session_id: &str) -> Result<SessionHandle, DebateError> {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| DebateError::SessionNotFound(session_id.to_string()))
    }

    async fn delete(&self, session_id: &str) -> Result<(), DebateError> {
        self.sessions
            .lock()
            .await
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| DebateError::SessionNotFound(session_id.to_string()))
    }
}
