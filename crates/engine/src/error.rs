//! Error types for the reasoning engine and its collaborators.

use taxwise_core::CoreError;
use taxwise_storage::StorageError;
use thiserror::Error;

use crate::machine::Phase;

/// Failure of a text-generation call.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// Network or HTTP transport error.
    #[error("generation network error: {0}")]
    Network(String),
    /// The generation API returned an error response.
    #[error("generation API error ({status}): {message}")]
    Api { status: u16, message: String },
    /// The response could not be used as structured output.
    #[error("malformed generation output ({reason}): {raw}")]
    Malformed { raw: String, reason: String },
}

/// Failure of a legal-corpus search call.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("search network error: {0}")]
    Network(String),
    #[error("search API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("malformed search response: {0}")]
    Malformed(String),
}

/// Failure to turn a free-text reply into a valid fact patch.
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    /// The extraction output was not JSON.
    #[error("extraction output is not JSON: {raw}")]
    Malformed { raw: String },
    /// The extraction output did not conform to the fact schema.
    #[error("extraction output failed validation: {}", errors.join("; "))]
    Invalid { errors: Vec<String> },
}

/// Errors surfaced to callers of the engine and the session service.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// A persisted session state could not be encoded or decoded.
    #[error("session state encoding error: {0}")]
    State(#[from] serde_json::Error),

    /// The reply names a request other than the outstanding one.
    #[error("reply is for request '{received}' but the session is waiting on '{expected}'")]
    RequestMismatch { expected: String, received: String },

    /// A reply arrived while no fact request is outstanding.
    #[error("no fact request is outstanding (phase: {phase})")]
    NoPendingRequest { phase: Phase },

    /// The session is finished or cancelled and accepts no further replies.
    #[error("session is closed (phase: {phase})")]
    SessionClosed { phase: Phase },

    /// Follow-up chat is only available once a verdict exists.
    #[error("chat is not available before the verdict (phase: {phase})")]
    ChatUnavailable { phase: Phase },
}

impl EngineError {
    /// Whether the error is a session-integrity failure: the caller sent a
    /// request the session cannot accept in its current state.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            EngineError::RequestMismatch { .. }
                | EngineError::NoPendingRequest { .. }
                | EngineError::SessionClosed { .. }
                | EngineError::ChatUnavailable { .. }
        )
    }

    /// Whether the error means the session does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::Storage(StorageError::SessionNotFound { .. }))
    }
}
