//! Persistent sessions: the engine plus a [`SessionStore`].
//!
//! Every turn is load, advance, save-with-loaded-version. A concurrent
//! writer makes the save fail with a version conflict instead of losing
//! either update. A turn that fails is never saved.

use std::sync::Arc;

use serde_json::Value;
use taxwise_storage::{SessionStore, SessionSummary};
use tracing::debug;

use crate::error::EngineError;
use crate::machine::{SessionState, TaxEngine, TurnOutcome};

pub struct SessionService<S: SessionStore> {
    engine: Arc<TaxEngine>,
    store: Arc<S>,
}

impl<S: SessionStore> Clone for SessionService<S> {
    fn clone(&self) -> Self {
        SessionService {
            engine: self.engine.clone(),
            store: self.store.clone(),
        }
    }
}

impl<S: SessionStore> SessionService<S> {
    pub fn new(engine: Arc<TaxEngine>, store: Arc<S>) -> Self {
        SessionService { engine, store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Start and persist a session. Returns its id and the first outcome.
    pub async fn start(&self, details: Value) -> Result<(String, TurnOutcome), EngineError> {
        let (state, outcome) = self.engine.start(details).await?;
        self.store
            .create_session(&state.session_id, serde_json::to_value(&state)?)
            .await?;
        Ok((state.session_id, outcome))
    }

    /// Answer the outstanding fact request of a session.
    pub async fn reply(
        &self,
        session_id: &str,
        request_id: &str,
        message: &str,
    ) -> Result<TurnOutcome, EngineError> {
        let (mut state, version) = self.load(session_id).await?;
        let outcome = self.engine.resume(&mut state, request_id, message).await?;
        self.save(&state, version).await?;
        Ok(outcome)
    }

    pub async fn cancel(&self, session_id: &str) -> Result<(), EngineError> {
        let (mut state, version) = self.load(session_id).await?;
        self.engine.cancel(&mut state)?;
        self.save(&state, version).await
    }

    /// Follow-up chat once the verdict exists.
    pub async fn chat(&self, session_id: &str, message: &str) -> Result<String, EngineError> {
        let (mut state, version) = self.load(session_id).await?;
        let reply = self.engine.chat(&mut state, message).await?;
        self.save(&state, version).await?;
        Ok(reply)
    }

    pub async fn get(&self, session_id: &str) -> Result<SessionState, EngineError> {
        Ok(self.load(session_id).await?.0)
    }

    pub async fn list(&self, limit: usize) -> Result<Vec<SessionSummary>, EngineError> {
        Ok(self.store.list_sessions(limit).await?)
    }

    async fn load(&self, session_id: &str) -> Result<(SessionState, i64), EngineError> {
        let record = self.store.load_session(session_id).await?;
        let state: SessionState = serde_json::from_value(record.state)?;
        Ok((state, record.version))
    }

    async fn save(&self, state: &SessionState, expected_version: i64) -> Result<(), EngineError> {
        let version = self
            .store
            .save_session(&state.session_id, expected_version, serde_json::to_value(state)?)
            .await?;
        debug!(session_id = %state.session_id, version, phase = %state.phase, "session saved");
        Ok(())
    }
}
