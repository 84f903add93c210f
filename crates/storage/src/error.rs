/// All errors that can be returned by a SessionStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Optimistic concurrency conflict: the session was saved by someone
    /// else since it was loaded.
    #[error("version conflict on session {session_id}: expected version {expected_version}, found {actual_version}")]
    VersionConflict {
        session_id: String,
        expected_version: i64,
        actual_version: i64,
    },

    /// No session with the given id.
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// A session with this id already exists.
    #[error("session already exists: {session_id}")]
    AlreadyExists { session_id: String },

    /// Session ids become file names, so they are restricted to
    /// ASCII alphanumerics, `-` and `_`.
    #[error("invalid session id '{session_id}'")]
    InvalidSessionId { session_id: String },

    /// A backend-specific storage error (I/O, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Backend(e.to_string())
    }
}
