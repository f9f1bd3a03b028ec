//! Summarizer: one structured [`Summary`] per subtopic, in subtopic order.

use super::StageContext;
use crate::brain::generate_structured;
use crate::error::LlmError;
use crate::research::prompts::{self, SUMMARIZER_SYSTEM};
use crate::research::records::{Chunk, Subtopic, Summary};
use crate::research::session::PipelineState;
use tracing::{info, warn};

/// Retrieved chunks shown to the model per subtopic.
pub const MAX_CONTEXT_CHUNKS: usize = 10;
/// Sources cited by a placeholder summary.
pub const PLACEHOLDER_SOURCES: usize = 3;

pub async fn run(mut state: PipelineState, ctx: &StageContext) -> PipelineState {
    let mut summaries = Vec::with_capacity(state.subtopics.len());
    let mut placeholders = 0usize;

    for subtopic in &state.subtopics {
        let chunks = state
            .retrieved
            .get(&subtopic.name)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let summary = match summarize(&state.topic, subtopic, chunks, ctx).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(subtopic = %subtopic.name, error = %e, "Summarization failed; using placeholder summary");
                placeholders += 1;
                placeholder_summary(subtopic, chunks)
            }
        };
        summaries.push(summary);
    }

    info!(
        summaries = summaries.len(),
        placeholders, "Summarization stage finished"
    );
    state.summaries = summaries;
    state
}

async fn summarize(
    topic: &str,
    subtopic: &Subtopic,
    chunks: &[Chunk],
    ctx: &StageContext,
) -> Result<Summary, LlmError> {
    let context = &chunks[..chunks.len().min(MAX_CONTEXT_CHUNKS)];
    let mut summary: Summary = generate_structured(
        ctx.llm.as_ref(),
        SUMMARIZER_SYSTEM,
        &prompts::summarizer_prompt(topic, subtopic, context),
        ctx.generation,
    )
    .await?;

    if summary.summary.trim().is_empty() {
        return Err(LlmError::ResponseParse {
            message: "summary text is empty".to_string(),
        });
    }
    // Summaries join back to subtopics by name, so the model does not get to rename them.
    summary.subtopic = subtopic.name.clone();
    Ok(summary)
}

/// Deterministic summary citing the first distinct retrieved URLs.
pub fn placeholder_summary(subtopic: &Subtopic, chunks: &[Chunk]) -> Summary {
    let mut sources: Vec<String> = Vec::with_capacity(PLACEHOLDER_SOURCES);
    for chunk in chunks {
        if sources.len() == PLACEHOLDER_SOURCES {
            break;
        }
        if !sources.contains(&chunk.metadata.url) {
            sources.push(chunk.metadata.url.clone());
        }
    }

    Summary {
        subtopic: subtopic.name.clone(),
        summary: format!(
            "Academic summary for {}. Based on {} retrieved sources.",
            subtopic.name,
            chunks.len()
        ),
        key_findings: vec![
            "Finding 1: Placeholder finding".to_string(),
            "Finding 2: Another finding".to_string(),
        ],
        sources,
    }
}
