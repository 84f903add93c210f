//! Text-generation collaborator.
//!
//! The engine treats generation as an opaque remote call: a system prompt
//! and a message list go in, text comes out. [`OutputMode::Json`] asks for
//! a single JSON document conforming to a schema; callers still validate
//! the result, since a generator reports failure by returning malformed
//! output as often as by erroring.

#[cfg(feature = "anthropic")]
mod anthropic;

#[cfg(feature = "anthropic")]
pub use anthropic::AnthropicClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GenerationError;

/// A message in a generation conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Plain text, or one JSON document matching `schema`.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputMode {
    Text,
    Json { schema: Value },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub mode: OutputMode,
}

impl GenerationRequest {
    /// A single-turn text request.
    pub fn text(system: impl Into<String>, user: impl Into<String>) -> Self {
        GenerationRequest {
            system: system.into(),
            messages: vec![Message::user(user)],
            mode: OutputMode::Text,
        }
    }

    /// A single-turn structured request.
    pub fn json(system: impl Into<String>, user: impl Into<String>, schema: Value) -> Self {
        GenerationRequest {
            system: system.into(),
            messages: vec![Message::user(user)],
            mode: OutputMode::Json { schema },
        }
    }
}

/// Pluggable text generation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;
}

/// Run a structured request and parse the reply as JSON.
///
/// Markdown fences around the document are tolerated. Anything that is
/// still not JSON is reported as [`GenerationError::Malformed`] with the
/// raw reply attached.
pub async fn generate_json(
    generator: &dyn TextGenerator,
    request: GenerationRequest,
) -> Result<Value, GenerationError> {
    let raw = generator.generate(request).await?;
    serde_json::from_str(strip_code_fences(&raw)).map_err(|e| GenerationError::Malformed {
        raw: raw.clone(),
        reason: e.to_string(),
    })
}

/// Strip markdown code fences from a model response.
pub fn strip_code_fences(s: &str) -> &str {
    let trimmed = s.trim();
    let without_prefix = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest
    } else {
        return trimmed;
    };
    without_prefix
        .strip_suffix("```")
        .unwrap_or(without_prefix)
        .trim()
}
