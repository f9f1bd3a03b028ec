//! Planner: topic -> 3..=6 subtopics.

use super::StageContext;
use crate::brain::generate_structured;
use crate::error::LlmError;
use crate::research::prompts::{self, PLANNER_SYSTEM};
use crate::research::records::Subtopic;
use crate::research::session::PipelineState;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{info, warn};

pub const MIN_SUBTOPICS: usize = 3;
pub const MAX_SUBTOPICS: usize = 6;

/// Models answer either `{"subtopics": [...]}` or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PlannerOutput {
    Wrapped { subtopics: Vec<Subtopic> },
    Bare(Vec<Subtopic>),
}

impl PlannerOutput {
    fn into_subtopics(self) -> Vec<Subtopic> {
        match self {
            PlannerOutput::Wrapped { subtopics } | PlannerOutput::Bare(subtopics) => subtopics,
        }
    }
}

pub async fn run(mut state: PipelineState, ctx: &StageContext) -> PipelineState {
    state.subtopics = match plan(&state.topic, ctx).await {
        Ok(subtopics) => {
            info!(count = subtopics.len(), "Planned subtopics");
            subtopics
        }
        Err(e) => {
            warn!(topic = %state.topic, error = %e, "Planning failed; using default subtopics");
            fallback_subtopics(&state.topic)
        }
    };
    state
}

async fn plan(topic: &str, ctx: &StageContext) -> Result<Vec<Subtopic>, LlmError> {
    let output: PlannerOutput = generate_structured(
        ctx.llm.as_ref(),
        PLANNER_SYSTEM,
        &prompts::planner_prompt(topic),
        ctx.generation,
    )
    .await?;
    validate_subtopics(output.into_subtopics())
}

/// Trim, drop unusable or duplicate entries, and cap the list.
///
/// Fewer than [`MIN_SUBTOPICS`] usable entries is an error.
pub fn validate_subtopics(raw: Vec<Subtopic>) -> Result<Vec<Subtopic>, LlmError> {
    let mut seen = HashSet::new();
    let subtopics: Vec<Subtopic> = raw
        .into_iter()
        .map(|s| Subtopic::new(s.name.trim(), s.search_query.trim(), s.rationale.trim()))
        .filter(Subtopic::is_valid)
        .filter(|s| seen.insert(s.name.to_lowercase()))
        .take(MAX_SUBTOPICS)
        .collect();

    if subtopics.len() < MIN_SUBTOPICS {
        return Err(LlmError::ResponseParse {
            message: format!(
                "planner returned {} usable subtopics, need at least {}",
                subtopics.len(),
                MIN_SUBTOPICS
            ),
        });
    }
    Ok(subtopics)
}

/// Fixed three-angle plan derived from the topic alone.
pub fn fallback_subtopics(topic: &str) -> Vec<Subtopic> {
    let topic = topic.trim();
    vec![
        Subtopic::new(
            "Overview",
            format!("{} overview", topic),
            "Provides foundational understanding",
        ),
        Subtopic::new(
            "Recent Advances",
            format!("{} recent advances", topic),
            "Covers latest developments",
        ),
        Subtopic::new(
            "Open Challenges",
            format!("{} challenges", topic),
            "Identifies open problems",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::MockLlmProvider;
    use crate::research::stages::testing::context_with_llm;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn sub(name: &str, query: &str) -> Subtopic {
        Subtopic::new(name, query, "why")
    }

    #[test]
    fn test_validate_caps_at_six() {
        let raw: Vec<Subtopic> = (1..=9)
            .map(|i| sub(&format!("S{}", i), &format!("q{}", i)))
            .collect();
        let out = validate_subtopics(raw).unwrap();
        assert_eq!(out.len(), MAX_SUBTOPICS);
        assert_eq!(out[5].name, "S6");
    }

    #[test]
    fn test_validate_drops_blank_and_duplicate() {
        let raw = vec![
            sub("A", "qa"),
            sub(" ", "qb"),
            sub("a", "qa again"),
            sub("C", ""),
            sub("D", "qd"),
            sub("E", "qe"),
        ];
        let out = validate_subtopics(raw).unwrap();
        let names: Vec<&str> = out.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["A", "D", "E"]);
    }

    #[test]
    fn test_validate_too_few_is_error() {
        let raw = vec![sub("A", "qa"), sub("B", "qb")];
        assert!(validate_subtopics(raw).is_err());
    }

    #[test]
    fn test_fallback_interpolates_topic() {
        let out = fallback_subtopics("quantum error correction");
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].search_query, "quantum error correction overview");
        assert_eq!(out[1].search_query, "quantum error correction recent advances");
        assert_eq!(out[2].search_query, "quantum error correction challenges");
        assert!(out.iter().all(Subtopic::is_valid));
    }

    #[tokio::test]
    async fn test_run_uses_model_plan() {
        let llm = MockLlmProvider::new();
        llm.queue_text(
            r#"{"subtopics": [
                {"name": "Surface codes", "search_query": "surface code threshold", "rationale": "r"},
                {"name": "Decoders", "search_query": "qec decoders", "rationale": "r"},
                {"name": "Hardware", "search_query": "qec hardware demonstrations", "rationale": "r"},
                {"name": "Bosonic codes", "search_query": "bosonic qec codes", "rationale": "r"}
            ]}"#,
        );
        let ctx = context_with_llm(Arc::new(llm));
        let state = run(PipelineState::new("quantum error correction"), &ctx).await;
        assert_eq!(state.subtopics.len(), 4);
        assert_eq!(state.subtopics[1].name, "Decoders");
    }

    #[tokio::test]
    async fn test_run_accepts_bare_array() {
        let llm = MockLlmProvider::new();
        llm.queue_text(
            r#"[{"name": "A", "search_query": "a"}, {"name": "B", "search_query": "b"}, {"name": "C", "search_query": "c"}]"#,
        );
        let ctx = context_with_llm(Arc::new(llm));
        let state = run(PipelineState::new("t"), &ctx).await;
        assert_eq!(state.subtopics.len(), 3);
        assert_eq!(state.subtopics[2].rationale, "");
    }

    #[tokio::test]
    async fn test_run_falls_back_on_failure() {
        let ctx = context_with_llm(Arc::new(MockLlmProvider::failing()));
        let state = run(PipelineState::new("graph neural networks"), &ctx).await;
        assert_eq!(state.subtopics, fallback_subtopics("graph neural networks"));
    }

    #[tokio::test]
    async fn test_run_falls_back_on_short_plan() {
        let llm = MockLlmProvider::new();
        llm.queue_text(r#"{"subtopics": [{"name": "Only", "search_query": "one"}]}"#);
        let ctx = context_with_llm(Arc::new(llm));
        let state = run(PipelineState::new("t"), &ctx).await;
        assert_eq!(state.subtopics.len(), 3);
        assert_eq!(state.subtopics[0].name, "Overview");
    }
}
