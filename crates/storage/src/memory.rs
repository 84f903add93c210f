//! In-memory `SessionStore`, used by the HTTP server and in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::record::{now_rfc3339, validate_session_id, SessionRecord, SessionSummary};
use crate::traits::SessionStore;

/// Sessions held in a map behind an async lock.
///
/// The write lock is held across the version check and the write, which
/// makes `save_session` atomic.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(
        &self,
        session_id: &str,
        state: serde_json::Value,
    ) -> Result<SessionRecord, StorageError> {
        validate_session_id(session_id)?;
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(session_id) {
            return Err(StorageError::AlreadyExists {
                session_id: session_id.to_string(),
            });
        }
        let now = now_rfc3339();
        let record = SessionRecord {
            session_id: session_id.to_string(),
            state,
            version: 0,
            created_at: now.clone(),
            updated_at: now,
        };
        sessions.insert(session_id.to_string(), record.clone());
        Ok(record)
    }

    async fn load_session(&self, session_id: &str) -> Result<SessionRecord, StorageError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| StorageError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }

    async fn save_session(
        &self,
        session_id: &str,
        expected_version: i64,
        state: serde_json::Value,
    ) -> Result<i64, StorageError> {
        let mut sessions = self.sessions.write().await;
        let record = sessions
            .get_mut(session_id)
            .ok_or_else(|| StorageError::SessionNotFound {
                session_id: session_id.to_string(),
            })?;
        if record.version != expected_version {
            return Err(StorageError::VersionConflict {
                session_id: session_id.to_string(),
                expected_version,
                actual_version: record.version,
            });
        }
        record.state = state;
        record.version += 1;
        record.updated_at = now_rfc3339();
        Ok(record.version)
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), StorageError> {
        match self.sessions.write().await.remove(session_id) {
            Some(_) => Ok(()),
            None => Err(StorageError::SessionNotFound {
                session_id: session_id.to_string(),
            }),
        }
    }

    async fn list_sessions(&self, limit: usize) -> Result<Vec<SessionSummary>, StorageError> {
        let sessions = self.sessions.read().await;
        let mut summaries: Vec<SessionSummary> = sessions.values().map(SessionSummary::from).collect();
        sort_and_limit(&mut summaries, limit);
        Ok(summaries)
    }
}

/// Most recent first; ties broken by id so listings are stable.
pub(crate) fn sort_and_limit(summaries: &mut Vec<SessionSummary>, limit: usize) {
    summaries.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.session_id.cmp(&b.session_id))
    });
    if limit > 0 {
        summaries.truncate(limit);
    }
}
