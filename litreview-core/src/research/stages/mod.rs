//! The eight pipeline stages.
//!
//! Every stage has the shape `PipelineState -> PipelineState`. Collaborator
//! failures are caught inside the stage and replaced with a deterministic
//! fallback value, so a stage never fails a run.

pub mod chunk_embed;
pub mod fetcher;
pub mod planner;
pub mod quality;
pub mod retriever;
pub mod searcher;
pub mod summarizer;
pub mod synthesizer;

use crate::brain::{GenerationOptions, LlmProvider};
use crate::cache::ResponseCache;
use crate::embeddings::Embedder;
use crate::web::{PageFetcher, SearchBackend};
use std::path::PathBuf;
use std::sync::Arc;

/// Collaborators and tunables shared by every stage of a run.
#[derive(Clone)]
pub struct StageContext {
    pub llm: Arc<dyn LlmProvider>,
    pub search: Arc<dyn SearchBackend>,
    pub fetcher: Arc<dyn PageFetcher>,
    /// Without an embedder, chunking falls back to one chunk per document.
    pub embedder: Option<Arc<dyn Embedder>>,
    pub cache: Option<ResponseCache>,
    pub generation: GenerationOptions,
    pub fetch_concurrency: usize,
    /// Where to persist the vector index after it is built.
    pub index_path: Option<PathBuf>,
}

impl StageContext {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        search: Arc<dyn SearchBackend>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        Self {
            llm,
            search,
            fetcher,
            embedder: None,
            cache: None,
            generation: GenerationOptions::default(),
            fetch_concurrency: 5,
            index_path: None,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_generation(mut self, generation: GenerationOptions) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.fetch_concurrency = concurrency.max(1);
        self
    }

    pub fn with_index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_path = Some(path.into());
        self
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted collaborators for stage unit tests.

    use super::StageContext;
    use crate::brain::LlmProvider;
    use crate::error::{FetchError, SearchError};
    use crate::web::{PageFetcher, SearchBackend, SearchHit};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Returns the same hits for every query and records the queries.
    pub struct StaticSearch {
        pub hits: Vec<SearchHit>,
        pub queries: Mutex<Vec<String>>,
    }

    impl StaticSearch {
        pub fn new(urls: &[&str]) -> Self {
            Self {
                hits: urls
                    .iter()
                    .map(|u| SearchHit::new("title", *u, "snippet"))
                    .collect(),
                queries: Mutex::new(Vec::new()),
            }
        }

        pub fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchBackend for StaticSearch {
        async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>, SearchError> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.hits.iter().take(count).cloned().collect())
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    pub struct FailingSearch;

    #[async_trait]
    impl SearchBackend for FailingSearch {
        async fn search(&self, _query: &str, _count: usize) -> Result<Vec<SearchHit>, SearchError> {
            Err(SearchError::Request {
                backend: "failing".into(),
                message: "network unreachable".into(),
            })
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    /// Returns `Text from {url}` repeated `repeat` times.
    pub struct EchoFetcher {
        pub repeat: usize,
    }

    #[async_trait]
    impl PageFetcher for EchoFetcher {
        async fn fetch(&self, url: &str, _timeout: Duration) -> Result<String, FetchError> {
            Ok(format!("Text from {}. ", url).repeat(self.repeat))
        }
    }

    pub struct FailingFetcher;

    #[async_trait]
    impl PageFetcher for FailingFetcher {
        async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
            Err(FetchError::Timeout {
                url: url.to_string(),
                timeout_secs: timeout.as_secs(),
            })
        }
    }

    pub fn context_with_llm(llm: Arc<dyn LlmProvider>) -> StageContext {
        StageContext::new(llm, Arc::new(FailingSearch), Arc::new(FailingFetcher))
    }
}
