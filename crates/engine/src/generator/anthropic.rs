//! Anthropic Messages API client.
//!
//! `ureq` is synchronous, so each call runs on the blocking pool.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{GenerationRequest, OutputMode, TextGenerator};
use crate::error::GenerationError;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 2048;

/// Generator backed by the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        AnthropicClient {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at another endpoint (a proxy or a local stub).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn body(&self, request: &GenerationRequest) -> Value {
        let system = match &request.mode {
            OutputMode::Text => request.system.clone(),
            OutputMode::Json { schema } => format!(
                "{}\n\nRespond with a single JSON document that conforms to this JSON Schema. \
                 Do not include markdown fences or any other text.\n{}",
                request.system,
                serde_json::to_string_pretty(schema).unwrap_or_else(|_| "{}".to_string())
            ),
        };
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| json!({ "role": m.role, "content": m.content }))
            .collect();
        json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "system": system,
            "messages": messages,
        })
    }
}

#[async_trait]
impl TextGenerator for AnthropicClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let body = self.body(&request);
        let url = format!("{}/v1/messages", self.base_url);
        let api_key = self.api_key.clone();

        tokio::task::spawn_blocking(move || {
            let agent = ureq::Agent::new_with_defaults();
            let response = agent
                .post(&url)
                .header("x-api-key", &api_key)
                .header("anthropic-version", API_VERSION)
                .header("content-type", "application/json")
                .send_json(body);

            match response {
                Ok(resp) => {
                    let json: Value = resp.into_body().read_json().map_err(|e| {
                        GenerationError::Network(format!("failed to read Anthropic response: {e}"))
                    })?;
                    json["content"]
                        .as_array()
                        .and_then(|arr| arr.first())
                        .and_then(|c| c["text"].as_str())
                        .map(|s| s.to_string())
                        .ok_or_else(|| GenerationError::Malformed {
                            raw: json.to_string(),
                            reason: "no text content in Anthropic response".to_string(),
                        })
                }
                Err(ureq::Error::StatusCode(status)) => Err(GenerationError::Api {
                    status,
                    message: format!("Anthropic API returned HTTP {status}"),
                }),
                Err(e) => Err(GenerationError::Network(e.to_string())),
            }
        })
        .await
        .map_err(|e| GenerationError::Network(format!("task join error: {e}")))?
    }
}
