//! Brain module: LLM provider abstraction and structured generation.
//!
//! Defines the `LlmProvider` trait for model-agnostic completions, the
//! helpers stages use to get free text or a typed record out of a model,
//! and a scriptable `MockLlmProvider` for tests.

use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, Message, TokenUsage};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use tracing::debug;

/// Trait for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Perform a full completion and return the response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Return the model name.
    fn model_name(&self) -> &str;

    /// Whether the provider honours `CompletionRequest::json_mode` natively.
    fn supports_json_mode(&self) -> bool {
        false
    }
}

/// Sampling options shared by every stage call.
#[derive(Debug, Clone, Copy)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: usize,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 4096,
        }
    }
}

/// Run a free-text generation and return the trimmed reply.
///
/// An empty reply is an error so callers can fall back.
pub async fn generate_text(
    provider: &dyn LlmProvider,
    system: &str,
    prompt: &str,
    options: GenerationOptions,
) -> Result<String, LlmError> {
    let request = CompletionRequest {
        messages: vec![Message::system(system), Message::user(prompt)],
        temperature: options.temperature,
        max_tokens: Some(options.max_tokens),
        ..Default::default()
    };
    let response = provider.complete(request).await?;
    let text = response.text().trim();
    if text.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(text.to_string())
}

/// Run a structured generation and deserialize the reply into `T`.
///
/// The reply may be wrapped in a markdown code fence; anything that does not
/// deserialize into `T` is reported as `LlmError::ResponseParse`.
pub async fn generate_structured<T: DeserializeOwned>(
    provider: &dyn LlmProvider,
    system: &str,
    prompt: &str,
    options: GenerationOptions,
) -> Result<T, LlmError> {
    let request = CompletionRequest {
        messages: vec![Message::system(system), Message::user(prompt)],
        temperature: options.temperature,
        max_tokens: Some(options.max_tokens),
        json_mode: true,
        ..Default::default()
    };
    let response = provider.complete(request).await?;
    debug!(
        model = %response.model,
        input_tokens = response.usage.input_tokens,
        output_tokens = response.usage.output_tokens,
        "Structured generation returned"
    );
    parse_structured(response.text())
}

/// Deserialize a model reply, tolerating a surrounding code fence or prose.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T, LlmError> {
    let body = extract_json(raw).ok_or_else(|| LlmError::ResponseParse {
        message: "No JSON object found in model output".to_string(),
    })?;
    serde_json::from_str(body).map_err(|e| LlmError::ResponseParse {
        message: format!("Output does not match schema: {}", e),
    })
}

/// Locate the JSON payload in a model reply.
fn extract_json(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        if let Some(end) = rest.rfind("```") {
            return Some(rest[..end].trim());
        }
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Some(trimmed);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

/// A mock LLM provider for testing and development.
///
/// Replies are consumed in the order they were queued; once the queue is
/// empty every call fails with `LlmError::Connection`.
pub struct MockLlmProvider {
    model: String,
    replies: std::sync::Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
    calls: std::sync::atomic::AtomicUsize,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            replies: std::sync::Mutex::new(VecDeque::new()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Create a provider that returns the given text for the next `count` calls.
    pub fn with_response(text: &str, count: usize) -> Self {
        let provider = Self::new();
        for _ in 0..count {
            provider.queue_response(Self::text_response(text));
        }
        provider
    }

    /// Create a provider whose every call fails.
    pub fn failing() -> Self {
        Self::new()
    }

    /// Queue a response to be returned by the next `complete` call.
    pub fn queue_response(&self, response: CompletionResponse) {
        self.lock().push_back(Ok(response));
    }

    /// Queue a plain text reply.
    pub fn queue_text(&self, text: &str) {
        self.queue_response(Self::text_response(text));
    }

    /// Queue an error to be returned by the next `complete` call.
    pub fn queue_error(&self, error: LlmError) {
        self.lock().push_back(Err(error));
    }

    /// Number of `complete` calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Create a simple text response for testing.
    pub fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            message: Message::assistant(text),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
            model: "mock-model".to_string(),
            finish_reason: Some("stop".to_string()),
        }
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, VecDeque<Result<CompletionResponse, LlmError>>> {
        self.replies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.lock().pop_front().unwrap_or_else(|| {
            Err(LlmError::Connection {
                message: "mock provider has no queued replies".to_string(),
            })
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn supports_json_mode(&self) -> bool {
        true
    }
}
