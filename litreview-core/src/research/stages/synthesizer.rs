//! Synthesizer: the final review, always present when the stage returns.

use super::StageContext;
use crate::brain::generate_text;
use crate::research::prompts::{self, SYNTHESIZER_SYSTEM};
use crate::research::records::Summary;
use crate::research::session::PipelineState;
use std::fmt::Write;
use tracing::{info, warn};

pub async fn run(mut state: PipelineState, ctx: &StageContext) -> PipelineState {
    let review = match generate_text(
        ctx.llm.as_ref(),
        SYNTHESIZER_SYSTEM,
        &prompts::synthesizer_prompt(&state.topic, &state.summaries),
        ctx.generation,
    )
    .await
    {
        Ok(text) => {
            info!(chars = text.len(), "Synthesized review");
            text
        }
        Err(e) => {
            warn!(error = %e, "Synthesis failed; assembling review from summaries");
            fallback_review(&state.topic, &state.summaries)
        }
    };
    state.final_review = Some(review);
    state
}

/// Markdown review assembled from the summaries without any model call.
pub fn fallback_review(topic: &str, summaries: &[Summary]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Literature Review: {}\n", topic);
    let _ = writeln!(out, "## Introduction\n");
    let _ = writeln!(
        out,
        "This literature review synthesizes research on {}, organized by subtopic.\n",
        topic
    );
    let _ = writeln!(out, "## Key Themes\n");

    if summaries.is_empty() {
        let _ = writeln!(out, "No subtopic summaries were produced.\n");
    }
    for summary in summaries {
        let _ = writeln!(out, "### {}\n", summary.subtopic);
        let _ = writeln!(out, "{}\n", summary.summary.trim());
        if !summary.key_findings.is_empty() {
            let _ = writeln!(out, "**Key Findings:**\n");
            for finding in &summary.key_findings {
                let _ = writeln!(out, "- {}", finding);
            }
            out.push('\n');
        }
        if !summary.sources.is_empty() {
            let _ = writeln!(out, "**Sources:** {}\n", summary.sources.join(", "));
        }
    }

    let _ = writeln!(out, "## Research Gaps\n");
    let _ = writeln!(
        out,
        "Further work is needed to consolidate these findings and to evaluate them on common benchmarks.\n"
    );
    let _ = writeln!(out, "## Conclusion\n");
    let _ = write!(
        out,
        "This review summarized current research on {} across {} subtopics.",
        topic,
        summaries.len()
    );
    out
}
