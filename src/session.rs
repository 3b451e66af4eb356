use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// A conversation with the remote agent. Only the id matters remotely;
/// conversational memory lives on the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    /// User messages sent in this session.
    pub messages: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// A new session with a fresh unique id.
    pub fn new() -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string())
    }

    /// Continue a session whose id is already known.
    pub fn with_id(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            messages: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn record_message(&mut self) {
        self.messages += 1;
        self.updated_at = Utc::now();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Persists sessions so a conversation can be picked up again by id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, session: &Session) -> Result<(), AgentError>;

    async fn load(&self, session_id: &str) -> Result<Option<Session>, AgentError>;
}

// --- NoSessionStore ---

/// No persistence. Fire-and-forget.
pub struct NoSessionStore;

#[async_trait]
impl SessionStore for NoSessionStore {
    async fn save(&self, _: &Session) -> Result<(), AgentError> {
        Ok(())
    }

    async fn load(&self, _: &str) -> Result<Option<Session>, AgentError> {
        Ok(None)
    }
}

// --- FileSessionStore ---

/// Saves each session to `<dir>/<id>.json`.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, session_id: &str) -> Result<PathBuf, AgentError> {
        if session_id.is_empty()
            || session_id
                .chars()
                .any(|c| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        {
            return Err(AgentError::Session(format!(
                "invalid session id: {session_id:?}"
            )));
        }
        Ok(self.dir.join(format!("{session_id}.json")))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn save(&self, session: &Session) -> Result<(), AgentError> {
        let path = self.path(&session.id)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AgentError::Session(e.to_string()))?;
        let json = serde_json::to_string_pretty(session)
            .map_err(|e| AgentError::Session(e.to_string()))?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| AgentError::Session(e.to_string()))?;
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<Session>, AgentError> {
        let path = self.path(session_id)?;
        match tokio::fs::read_to_string(path).await {
            Ok(json) => {
                let session: Session = serde_json::from_str(&json)
                    .map_err(|e| AgentError::Session(e.to_string()))?;
                Ok(Some(session))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AgentError::Session(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_sessions_have_unique_ids() {
        let a = Session::new();
        let b = Session::new();
        assert_ne!(a.id, b.id);
        assert_eq!(a.messages, 0);
    }

    #[tokio::test]
    async fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("sessions"));

        let mut session = Session::with_id("chat-1");
        session.record_message();
        store.save(&session).await.unwrap();

        let loaded = store.load("chat-1").await.unwrap().unwrap();
        assert_eq!(loaded, session);
        assert!(store.load("chat-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let err = store.load("../etc/passwd").await.unwrap_err();
        assert!(matches!(err, AgentError::Session(_)));
    }

    #[tokio::test]
    async fn no_store_forgets() {
        NoSessionStore.save(&Session::new()).await.unwrap();
        assert!(NoSessionStore.load("x").await.unwrap().is_none());
    }
}
