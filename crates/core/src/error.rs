use thiserror::Error;

/// Errors raised while building or reading a [`FactBase`](crate::FactBase).
///
/// Calculation itself never fails: absent facts default to zero or to the
/// "unknown" category. These errors only cover malformed input documents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The initial user details were not a JSON object.
    #[error("user details must be a JSON object, got {found}")]
    NotAnObject { found: String },

    /// A dotted path was empty or contained an empty segment (`a..b`).
    #[error("invalid fact path '{path}'")]
    InvalidPath { path: String },
}

impl CoreError {
    pub(crate) fn not_an_object(value: &serde_json::Value) -> Self {
        let found = match value {
            serde_json::Value::Null => "null",
            serde_json::Value::Bool(_) => "a boolean",
            serde_json::Value::Number(_) => "a number",
            serde_json::Value::String(_) => "a string",
            serde_json::Value::Array(_) => "an array",
            serde_json::Value::Object(_) => "an object",
        };
        CoreError::NotAnObject {
            found: found.to_string(),
        }
    }
}
