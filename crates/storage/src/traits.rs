use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{SessionRecord, SessionSummary};

/// Durable storage of one session state document per session id.
///
/// ## OCC Conflict Detection
///
/// `save_session` is a compare-and-swap on the version: it succeeds only
/// if the stored version still equals `expected_version`, otherwise it
/// returns `Err(StorageError::VersionConflict { .. })` and leaves the
/// stored state untouched. A load followed by a save with the loaded
/// version is therefore an atomic read-modify-write; two writers racing
/// from the same version cannot both win.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be used in axum
/// application state and across async task boundaries.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Store a new session at version 0.
    ///
    /// Returns `Err(StorageError::AlreadyExists)` if the id is taken.
    async fn create_session(
        &self,
        session_id: &str,
        state: serde_json::Value,
    ) -> Result<SessionRecord, StorageError>;

    /// Read a session.
    ///
    /// Returns `Err(StorageError::SessionNotFound)` if it does not exist.
    async fn load_session(&self, session_id: &str) -> Result<SessionRecord, StorageError>;

    /// Replace a session's state if its version is still `expected_version`.
    ///
    /// Returns the new version number on success.
    async fn save_session(
        &self,
        session_id: &str,
        expected_version: i64,
        state: serde_json::Value,
    ) -> Result<i64, StorageError>;

    /// Remove a session.
    ///
    /// Returns `Err(StorageError::SessionNotFound)` if it does not exist.
    async fn delete_session(&self, session_id: &str) -> Result<(), StorageError>;

    /// List sessions, most recently updated first.
    ///
    /// `limit` of 0 means no limit.
    async fn list_sessions(&self, limit: usize) -> Result<Vec<SessionSummary>, StorageError>;
}
