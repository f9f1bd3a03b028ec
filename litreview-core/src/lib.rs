//! # Litreview Core
//!
//! Core library for the literature review pipeline.
//! Provides the LLM interface (brain), embeddings, the response cache,
//! configuration, the search/fetch capability traits, and the staged
//! research pipeline with its graph runner.

pub mod brain;
pub mod cache;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod providers;
pub mod research;
pub mod types;
pub mod web;

// Re-export commonly used types at the crate root.
pub use brain::{GenerationOptions, LlmProvider, MockLlmProvider};
pub use cache::{CacheStats, ResponseCache};
pub use config::{ReviewConfig, SearchBackendKind, load_config};
pub use embeddings::{Embedder, LocalEmbedder, create_embedder};
pub use error::{Result, ReviewError};
pub use providers::create_provider;
pub use research::{PipelineObserver, PipelineState, ReviewEngine, RunSummary, Stage, StageContext};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, TokenUsage};
pub use web::{PageFetcher, SearchBackend, SearchHit};
