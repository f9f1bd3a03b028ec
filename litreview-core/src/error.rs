//! Error types for the litreview core library.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering LLM calls, embeddings, search, page fetching, caching and
//! configuration. Pipeline stages never surface these past their own
//! boundary; they are converted into fallback values and logged.

use std::path::PathBuf;

/// Top-level error type for the litreview core library.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from LLM provider interactions.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },

    #[error("Unsupported provider: {provider}")]
    UnsupportedProvider { provider: String },
}

/// Errors from embedding providers and the vector index.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Embedding request failed: {message}")]
    Request { message: String },

    #[error("Embedding response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Expected {expected} embeddings, got {got}")]
    CountMismatch { expected: usize, got: usize },

    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Authentication failed for embedding provider {provider}")]
    AuthFailed { provider: String },

    #[error("Index persistence failed for {path}: {message}")]
    Persistence { path: PathBuf, message: String },

    #[error("Unsupported embedding provider: {provider}")]
    UnsupportedProvider { provider: String },
}

impl From<LlmError> for EmbeddingError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::AuthFailed { provider } => EmbeddingError::AuthFailed { provider },
            LlmError::ResponseParse { message } => EmbeddingError::ResponseParse { message },
            other => EmbeddingError::Request {
                message: other.to_string(),
            },
        }
    }
}

/// Errors from web search backends.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search backend '{backend}' request failed: {message}")]
    Request { backend: String, message: String },

    #[error("Search backend '{backend}' returned HTTP {status}")]
    Status { backend: String, status: u16 },

    #[error("Search backend '{backend}' response could not be parsed: {message}")]
    Parse { backend: String, message: String },

    #[error("Search backend '{backend}' requires env var {var}")]
    MissingKey { backend: String, var: String },
}

/// Errors from fetching and extracting a web page.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Unsupported URL scheme: {url}")]
    UnsupportedScheme { url: String },

    #[error("Fetch of {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    #[error("Fetch of {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Fetch of {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("No readable text extracted from {url}")]
    EmptyContent { url: String },
}

/// Errors from the on-disk response cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache write to {path} failed: {message}")]
    Write { path: PathBuf, message: String },

    #[error("Cache directory {path} could not be read: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Invalid cache namespace '{namespace}': expected a single directory name")]
    InvalidNamespace { namespace: String },
}

/// Errors from configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Result type alias for litreview operations.
pub type Result<T> = std::result::Result<T, ReviewError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_llm() {
        let err = ReviewError::Llm(LlmError::ApiRequest {
            message: "connection refused".into(),
        });
        assert_eq!(
            err.to_string(),
            "LLM error: API request failed: connection refused"
        );
    }

    #[test]
    fn test_error_display_search() {
        let err = ReviewError::Search(SearchError::Status {
            backend: "brave".into(),
            status: 429,
        });
        assert_eq!(
            err.to_string(),
            "Search error: Search backend 'brave' returned HTTP 429"
        );
    }

    #[test]
    fn test_error_display_fetch_timeout() {
        let err = FetchError::Timeout {
            url: "https://example.com".into(),
            timeout_secs: 10,
        };
        assert_eq!(
            err.to_string(),
            "Fetch of https://example.com timed out after 10s"
        );
    }

    #[test]
    fn test_error_display_config() {
        let err = ReviewError::Config(ConfigError::EnvVarMissing {
            var: "OPENAI_API_KEY".into(),
        });
        assert_eq!(
            err.to_string(),
            "Configuration error: Environment variable not set: OPENAI_API_KEY"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ReviewError = io_err.into();
        assert!(matches!(err, ReviewError::Io(_)));
    }

    #[test]
    fn test_embedding_mismatch_display() {
        let err = EmbeddingError::CountMismatch {
            expected: 4,
            got: 3,
        };
        assert_eq!(err.to_string(), "Expected 4 embeddings, got 3");
    }
}
