//! Retriever: up to [`RETRIEVAL_LIMIT`] chunks per subtopic.

use super::StageContext;
use crate::embeddings::Embedder;
use crate::error::EmbeddingError;
use crate::research::index::VectorIndex;
use crate::research::records::{Chunk, Subtopic};
use crate::research::session::PipelineState;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Chunks kept per subtopic, for semantic search and metadata filtering alike.
pub const RETRIEVAL_LIMIT: usize = 10;

pub async fn run(mut state: PipelineState, ctx: &StageContext) -> PipelineState {
    let mut retrieved = HashMap::with_capacity(state.subtopics.len());

    for subtopic in &state.subtopics {
        let chunks = match (state.vector_index.as_ref(), ctx.embedder.as_ref()) {
            (Some(index), Some(embedder)) => {
                match semantic_search(index, embedder.as_ref(), subtopic).await {
                    Ok(chunks) => chunks,
                    Err(e) => {
                        warn!(subtopic = %subtopic.name, error = %e, "Vector search failed; filtering by metadata");
                        filter_by_subtopic(&state.chunks, &subtopic.name)
                    }
                }
            }
            _ => filter_by_subtopic(&state.chunks, &subtopic.name),
        };
        debug!(subtopic = %subtopic.name, chunks = chunks.len(), "Retrieved chunks");
        retrieved.insert(subtopic.name.clone(), chunks);
    }

    info!(
        subtopics = retrieved.len(),
        semantic = state.vector_index.is_some(),
        "Retrieval stage finished"
    );
    state.retrieved = retrieved;
    state
}

async fn semantic_search(
    index: &VectorIndex,
    embedder: &dyn Embedder,
    subtopic: &Subtopic,
) -> Result<Vec<Chunk>, EmbeddingError> {
    let query = embedder.embed(&subtopic.search_query).await?;
    index.search(&query, RETRIEVAL_LIMIT)
}

/// Chunks tagged with exactly `subtopic`, in chunk order.
pub fn filter_by_subtopic(chunks: &[Chunk], subtopic: &str) -> Vec<Chunk> {
    chunks
        .iter()
        .filter(|c| c.metadata.subtopic == subtopic)
        .take(RETRIEVAL_LIMIT)
        .cloned()
        .collect()
}
