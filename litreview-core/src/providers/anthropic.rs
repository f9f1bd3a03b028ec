//! Anthropic Messages API provider.

use super::{map_transport_error, with_retry};
use crate::brain::LlmProvider;
use crate::config::{LlmConfig, RetryConfig};
use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, Message, Role, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Provider for Anthropic's `/v1/messages` endpoint.
pub struct AnthropicProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
    retry: RetryConfig,
}

impl AnthropicProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = super::resolve_api_key(config)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Connection {
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.anthropic.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
            retry: config.retry.clone(),
        })
    }

    /// System messages go in the top-level `system` field; the rest become turns.
    fn build_body(&self, request: &CompletionRequest) -> Value {
        let mut system = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        if request.json_mode {
            system.push_str("\n\nRespond with a single JSON object and nothing else.");
        }
        let messages: Vec<Value> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| json!({ "role": m.role.to_string(), "content": m.content }))
            .collect();

        let mut body = json!({
            "model": request.model.as_deref().unwrap_or(&self.model),
            "max_tokens": request.max_tokens.unwrap_or(4096),
            "temperature": request.temperature,
            "messages": messages,
        });
        if !system.trim().is_empty() {
            body["system"] = json!(system.trim());
        }
        body
    }

    async fn send_once(&self, body: &Value) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/v1/messages", self.base_url);
        debug!(url = %url, model = %self.model, "Sending Anthropic messages request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| map_transport_error(e, self.timeout_secs))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        let text = response.text().await.map_err(|e| LlmError::ApiRequest {
            message: format!("Failed to read response body: {}", e),
        })?;

        match status.as_u16() {
            200..=299 => {}
            401 | 403 => {
                return Err(LlmError::AuthFailed {
                    provider: "Anthropic".to_string(),
                });
            }
            429 => {
                return Err(LlmError::RateLimited {
                    retry_after_secs: retry_after.unwrap_or(5),
                });
            }
            code => {
                return Err(LlmError::ApiRequest {
                    message: format!("HTTP {}: {}", code, text),
                });
            }
        }

        let json: Value = serde_json::from_str(&text).map_err(|e| LlmError::ResponseParse {
            message: format!("Invalid JSON: {}", e),
        })?;
        Self::parse_response(&json, &self.model)
    }

    fn parse_response(body: &Value, model: &str) -> Result<CompletionResponse, LlmError> {
        let blocks = body
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| LlmError::ResponseParse {
                message: "No content blocks in response".to_string(),
            })?;
        let text: String = blocks
            .iter()
            .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("");

        let usage = body
            .get("usage")
            .map(|u| TokenUsage {
                input_tokens: u.get("input_tokens").and_then(|v| v.as_u64()).unwrap_or(0)
                    as usize,
                output_tokens: u.get("output_tokens").and_then(|v| v.as_u64()).unwrap_or(0)
                    as usize,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            message: Message::new(Role::Assistant, text),
            usage,
            model: body
                .get("model")
                .and_then(|m| m.as_str())
                .unwrap_or(model)
                .to_string(),
            finish_reason: body
                .get("stop_reason")
                .and_then(|s| s.as_str())
                .map(|s| s.to_string()),
        })
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.build_body(&request);
        with_retry(&self.retry, || self.send_once(&body)).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
