use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// One persisted session: an opaque state document plus its version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    /// The serialized session state. Storage never interprets it.
    pub state: serde_json::Value,
    /// Starts at 0 and increases by one on every successful save.
    pub version: i64,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub created_at: String,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub updated_at: String,
}

/// Listing entry: everything except the state document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub version: i64,
    pub updated_at: String,
}

impl From<&SessionRecord> for SessionSummary {
    fn from(record: &SessionRecord) -> Self {
        SessionSummary {
            session_id: record.session_id.clone(),
            version: record.version,
            updated_at: record.updated_at.clone(),
        }
    }
}

/// RFC 3339 timestamp for "now", in UTC.
pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

pub(crate) fn validate_session_id(session_id: &str) -> Result<(), StorageError> {
    let valid = !session_id.is_empty()
        && session_id.len() <= 128
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidSessionId {
            session_id: session_id.to_string(),
        })
    }
}
