//! Capability interfaces for web search and page fetching.
//!
//! Concrete backends live in `litreview-tools`; the pipeline only sees
//! these traits, chosen once when the engine is built.

use crate::error::{FetchError, SearchError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One organic search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

impl SearchHit {
    pub fn new(title: impl Into<String>, url: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
        }
    }
}

/// A web search backend.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Return up to `count` results in backend ranking order. Zero results is `Ok`.
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>, SearchError>;

    /// Short identifier used in logs and cache keys.
    fn name(&self) -> &str;
}

/// Retrieves a page and returns its readable text.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError>;
}

/// Whether `url` uses the http or https scheme.
pub fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
