//! Chunk & Embed: window every document and build the run's vector index.
//!
//! When splitting or embedding cannot produce an index, the stage emits one
//! truncated chunk per document, leaves `vector_index` unset and records
//! [`ChunkingOutcome::Fallback`] so the retriever filters by metadata.

use super::StageContext;
use crate::research::chunking::{RecursiveSplitter, truncate_chars};
use crate::research::index::VectorIndex;
use crate::research::records::{Chunk, Document};
use crate::research::session::{ChunkingOutcome, PipelineState};
use tracing::{info, warn};

/// Characters kept per document on the fallback path.
pub const FALLBACK_CHUNK_CHARS: usize = 1000;

pub async fn run(mut state: PipelineState, ctx: &StageContext) -> PipelineState {
    state.vector_index = None;

    if state.documents.is_empty() {
        info!("No documents to chunk");
        state.chunks = Vec::new();
        state.chunking = ChunkingOutcome::Empty;
        return state;
    }

    let Some(embedder) = ctx.embedder.as_ref() else {
        return fall_back(state, "embeddings disabled".to_string());
    };

    let chunks = RecursiveSplitter::default().split_documents(&state.documents);
    if chunks.is_empty() {
        return fall_back(state, "splitter produced no chunks".to_string());
    }

    match VectorIndex::build(&chunks, embedder.as_ref()).await {
        Ok(index) => {
            info!(
                chunks = chunks.len(),
                documents = state.documents.len(),
                provider = embedder.provider_name(),
                "Built vector index"
            );
            if let Some(path) = &ctx.index_path
                && let Err(e) = index.save(path)
            {
                warn!(path = %path.display(), error = %e, "Could not persist vector index");
            }
            state.chunks = chunks;
            state.vector_index = Some(index);
            state.chunking = ChunkingOutcome::Indexed;
            state
        }
        Err(e) => {
            warn!(error = %e, "Embedding failed; using one chunk per document");
            fall_back(state, e.to_string())
        }
    }
}

fn fall_back(mut state: PipelineState, reason: String) -> PipelineState {
    state.chunks = fallback_chunks(&state.documents);
    state.vector_index = None;
    info!(chunks = state.chunks.len(), reason = %reason, "Using fallback chunks");
    state.chunking = ChunkingOutcome::Fallback { reason };
    state
}

/// One chunk per document holding its first [`FALLBACK_CHUNK_CHARS`] characters.
pub fn fallback_chunks(documents: &[Document]) -> Vec<Chunk> {
    documents
        .iter()
        .map(|doc| Chunk::from_document(doc, truncate_chars(&doc.content, FALLBACK_CHUNK_CHARS)))
        .collect()
}
