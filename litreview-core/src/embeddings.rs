//! Embedding providers.
//!
//! `OpenAiEmbedder` calls the `/embeddings` endpoint in batches,
//! `LocalEmbedder` produces deterministic hashed term-frequency vectors
//! without any network access, and `CachedEmbedder` memoises another
//! embedder through the response cache.

use crate::cache::{EMBEDDINGS_NAMESPACE, ResponseCache};
use crate::config::{EmbeddingConfig, RetryConfig};
use crate::error::{EmbeddingError, LlmError};
use crate::providers::{map_transport_error, with_retry};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Trait for text embedding providers.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts; the result has one vector per input, in order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or(EmbeddingError::CountMismatch {
            expected: 1,
            got: 0,
        })
    }

    /// Return the dimensionality of embeddings.
    fn dimensions(&self) -> usize;

    /// Return the provider name.
    fn provider_name(&self) -> &str;
}

/// Offline embedder: hashed term frequencies, L2 normalised.
pub struct LocalEmbedder {
    dimensions: usize,
}

impl LocalEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        let lowered = text.to_lowercase();
        let mut tf: HashMap<&str, usize> = HashMap::new();
        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            *tf.entry(word).or_insert(0) += 1;
        }

        for (term, count) in &tf {
            let idx = simple_hash(term) % self.dimensions;
            vector[idx] += *count as f32;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

/// djb2
fn simple_hash(s: &str) -> usize {
    let mut hash: usize = 5381;
    for b in s.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(b as usize);
    }
    hash
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "local"
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// Client for OpenAI-compatible `/embeddings` endpoints.
pub struct OpenAiEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
    batch_size: usize,
    retry: RetryConfig,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| EmbeddingError::AuthFailed {
                provider: format!("openai: env var '{}' not set", config.api_key_env),
            })?;
        Self::new_with_key(config, api_key)
    }

    pub fn new_with_key(config: &EmbeddingConfig, api_key: String) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| EmbeddingError::Request {
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            model: config.model.clone(),
            dimensions: config.dimensions,
            batch_size: config.batch_size.max(1),
            retry: RetryConfig::default(),
        })
    }

    async fn request_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": batch }))
            .send()
            .await
            .map_err(|e| map_transport_error(e, 60))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| LlmError::ApiRequest {
            message: format!("Failed to read response body: {}", e),
        })?;
        match status.as_u16() {
            200..=299 => {}
            401 | 403 => {
                return Err(LlmError::AuthFailed {
                    provider: "openai embeddings".to_string(),
                });
            }
            429 => {
                return Err(LlmError::RateLimited {
                    retry_after_secs: 5,
                });
            }
            code => {
                return Err(LlmError::ApiRequest {
                    message: format!("HTTP {}: {}", code, body),
                });
            }
        }
        Self::parse_response(&body).map_err(|e| LlmError::ResponseParse {
            message: e.to_string(),
        })
    }

    /// Parse an `/embeddings` body, restoring input order by `index`.
    fn parse_response(body: &str) -> Result<Vec<Vec<f32>>, serde_json::Error> {
        let mut parsed: EmbeddingResponse = serde_json::from_str(body)?;
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let vectors = with_retry(&self.retry, || self.request_batch(batch)).await?;
            if vectors.len() != batch.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: batch.len(),
                    got: vectors.len(),
                });
            }
            if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimensions) {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimensions,
                    got: bad.len(),
                });
            }
            debug!(batch = batch.len(), model = %self.model, "Embedded batch");
            out.extend(vectors);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

/// Memoises an inner embedder in the `embeddings` cache namespace.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: ResponseCache,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, cache: ResponseCache) -> Self {
        Self { inner, cache }
    }

    fn cache_key(&self, text: &str) -> String {
        format!(
            "{}:{}:{}",
            self.inner.provider_name(),
            self.inner.dimensions(),
            text
        )
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut slots: Vec<Option<Vec<f32>>> = texts
            .iter()
            .map(|t| {
                self.cache
                    .get::<Vec<f32>>(EMBEDDINGS_NAMESPACE, &self.cache_key(t))
                    .filter(|v| v.len() == self.inner.dimensions())
            })
            .collect();

        let missing: Vec<usize> = (0..texts.len()).filter(|&i| slots[i].is_none()).collect();
        debug!(
            hits = texts.len() - missing.len(),
            misses = missing.len(),
            "Embedding cache lookup"
        );

        if !missing.is_empty() {
            let to_embed: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let fresh = self.inner.embed_batch(&to_embed).await?;
            if fresh.len() != to_embed.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: to_embed.len(),
                    got: fresh.len(),
                });
            }
            for (&i, vector) in missing.iter().zip(fresh) {
                self.cache
                    .put_or_warn(EMBEDDINGS_NAMESPACE, &self.cache_key(&texts[i]), &vector);
                slots[i] = Some(vector);
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }
}

/// Create an embedder from configuration.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, EmbeddingError> {
    match config.provider.as_str() {
        "local" => Ok(Arc::new(LocalEmbedder::new(config.dimensions))),
        "openai" => Ok(Arc::new(OpenAiEmbedder::new(config)?)),
        other => Err(EmbeddingError::UnsupportedProvider {
            provider: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_local_embedder_deterministic_and_normalised() {
        let embedder = LocalEmbedder::new(64);
        let a = embedder.embed("quantum error correction").await.unwrap();
        let b = embedder.embed("quantum error correction").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_local_embedder_empty_text_is_zero() {
        let embedder = LocalEmbedder::new(8);
        let v = tokio_test::block_on(embedder.embed("   ")).unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_parse_response_restores_order() {
        let body = r#"{"data": [
            {"index": 1, "embedding": [0.0, 1.0]},
            {"index": 0, "embedding": [1.0, 0.0]}
        ]}"#;
        let vectors = OpenAiEmbedder::parse_response(body).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_create_embedder_unknown() {
        let config = EmbeddingConfig {
            provider: "word2vec".into(),
            ..Default::default()
        };
        assert!(matches!(
            create_embedder(&config),
            Err(EmbeddingError::UnsupportedProvider { .. })
        ));
    }

    #[test]
    fn test_llm_error_converts() {
        let err: EmbeddingError = LlmError::AuthFailed {
            provider: "x".into(),
        }
        .into();
        assert!(matches!(err, EmbeddingError::AuthFailed { .. }));
    }

    struct CountingEmbedder {
        calls: AtomicUsize,
        texts: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.texts.fetch_add(texts.len(), Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
        fn dimensions(&self) -> usize {
            2
        }
        fn provider_name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_cached_embedder_only_embeds_misses() {
        let dir = tempfile::tempdir().unwrap();
        let inner = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
            texts: AtomicUsize::new(0),
        });
        let cached = CachedEmbedder::new(
            inner.clone(),
            ResponseCache::new(dir.path(), Duration::from_secs(60)),
        );

        let first = cached
            .embed_batch(&["a".to_string(), "bb".to_string()])
            .await
            .unwrap();
        assert_eq!(first, vec![vec![1.0, 1.0], vec![2.0, 1.0]]);

        let second = cached
            .embed_batch(&["bb".to_string(), "ccc".to_string(), "a".to_string()])
            .await
            .unwrap();
        assert_eq!(second, vec![vec![2.0, 1.0], vec![3.0, 1.0], vec![1.0, 1.0]]);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(inner.texts.load(Ordering::SeqCst), 3);
    }
}
