//! Review engine: drives the stage graph from planning to synthesis.
//!
//! The graph is a fixed edge list with a single conditional edge out of the
//! quality gate, which can send the run back to the searcher once.

use super::session::PipelineState;
use super::stages::quality::{self, MAX_RETRIES, Route, low_count_notice, route_after_quality};
use super::stages::synthesizer::fallback_review;
use super::stages::{
    StageContext, chunk_embed, fetcher, planner, retriever, searcher, summarizer, synthesizer,
};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// The eight pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Planner,
    Searcher,
    Fetcher,
    QualityGate,
    ChunkEmbed,
    Retriever,
    Summarizer,
    Synthesizer,
}

impl Stage {
    /// Every stage in standard execution order.
    pub const ALL: [Stage; 8] = [
        Stage::Planner,
        Stage::Searcher,
        Stage::Fetcher,
        Stage::QualityGate,
        Stage::ChunkEmbed,
        Stage::Retriever,
        Stage::Summarizer,
        Stage::Synthesizer,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Planner => "planner",
            Stage::Searcher => "searcher",
            Stage::Fetcher => "fetcher",
            Stage::QualityGate => "quality_gate",
            Stage::ChunkEmbed => "chunk_embed",
            Stage::Retriever => "retriever",
            Stage::Summarizer => "summarizer",
            Stage::Synthesizer => "synthesizer",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outgoing edge of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Next(Stage),
    /// Decided by [`route_after_quality`] on the state the stage returned.
    Branch { retry: Stage, proceed: Stage },
    End,
}

/// Entry stage plus one outgoing edge per stage.
#[derive(Debug, Clone)]
pub struct ReviewGraph {
    entry: Stage,
    edges: HashMap<Stage, Edge>,
}

impl ReviewGraph {
    pub fn new(entry: Stage, edges: impl IntoIterator<Item = (Stage, Edge)>) -> Self {
        Self {
            entry,
            edges: edges.into_iter().collect(),
        }
    }

    /// Planner through synthesizer, retrying search once on a failed gate.
    pub fn standard() -> Self {
        Self::new(
            Stage::Planner,
            [
                (Stage::Planner, Edge::Next(Stage::Searcher)),
                (Stage::Searcher, Edge::Next(Stage::Fetcher)),
                (Stage::Fetcher, Edge::Next(Stage::QualityGate)),
                (
                    Stage::QualityGate,
                    Edge::Branch {
                        retry: Stage::Searcher,
                        proceed: Stage::ChunkEmbed,
                    },
                ),
                (Stage::ChunkEmbed, Edge::Next(Stage::Retriever)),
                (Stage::Retriever, Edge::Next(Stage::Summarizer)),
                (Stage::Summarizer, Edge::Next(Stage::Synthesizer)),
                (Stage::Synthesizer, Edge::End),
            ],
        )
    }

    pub fn entry(&self) -> Stage {
        self.entry
    }

    /// A stage without an edge ends the run.
    pub fn edge(&self, stage: Stage) -> Edge {
        self.edges.get(&stage).copied().unwrap_or(Edge::End)
    }

    /// Upper bound on stage executions for one run.
    pub fn max_steps(&self) -> usize {
        self.edges.len().max(1) * (MAX_RETRIES as usize + 2)
    }
}

impl Default for ReviewGraph {
    fn default() -> Self {
        Self::standard()
    }
}

/// Progress hooks for a running review.
pub trait PipelineObserver: Send + Sync {
    fn on_stage_start(&self, _stage: Stage) {}
    fn on_stage_complete(&self, _stage: Stage, _elapsed: Duration, _state: &PipelineState) {}
    /// Called after the quality gate with the decision and the retry count it saw.
    fn on_route(&self, _route: Route, _retry_count: u32) {}
}

pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

pub struct ReviewEngine {
    ctx: StageContext,
    graph: ReviewGraph,
    observer: Arc<dyn PipelineObserver>,
}

impl ReviewEngine {
    pub fn new(ctx: StageContext) -> Self {
        Self {
            ctx,
            graph: ReviewGraph::standard(),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_graph(mut self, graph: ReviewGraph) -> Self {
        self.graph = graph;
        self
    }

    pub fn context(&self) -> &StageContext {
        &self.ctx
    }

    /// Run the whole graph for `topic`. The returned state always carries a final review.
    pub async fn run(&self, topic: &str) -> PipelineState {
        self.run_state(PipelineState::new(topic.trim())).await
    }

    /// Run the graph starting from an existing state.
    pub async fn run_state(&self, mut state: PipelineState) -> PipelineState {
        let run_started = Instant::now();
        let max_steps = self.graph.max_steps();
        let mut steps = 0usize;
        let mut current = Some(self.graph.entry());

        info!(run_id = %state.run_id, topic = %state.topic, "Starting literature review");

        while let Some(stage) = current {
            if steps >= max_steps {
                warn!(run_id = %state.run_id, max_steps, stage = %stage, "Step limit reached; stopping graph");
                break;
            }
            steps += 1;

            self.observer.on_stage_start(stage);
            let started = Instant::now();
            state = self.execute(stage, state).await;
            let elapsed = started.elapsed();
            info!(
                run_id = %state.run_id,
                stage = %stage,
                elapsed_ms = elapsed.as_millis() as u64,
                "Stage complete"
            );
            self.observer.on_stage_complete(stage, elapsed, &state);

            current = match self.graph.edge(stage) {
                Edge::Next(next) => Some(next),
                Edge::Branch { retry, proceed } => {
                    let retry_count = state.retry_count();
                    let route = route_after_quality(&state.quality);
                    info!(run_id = %state.run_id, route = %route, retry_count, "Quality gate routed");
                    self.observer.on_route(route, retry_count);
                    if state.quality.passed() == Some(false) {
                        warn!(run_id = %state.run_id, retry_count, "{}", low_count_notice(route));
                    }
                    match route {
                        Route::Retry => {
                            state.begin_retry();
                            Some(retry)
                        }
                        Route::Continue => Some(proceed),
                    }
                }
                Edge::End => None,
            };
        }

        if state.final_review.is_none() {
            warn!(run_id = %state.run_id, "Graph ended without a review; assembling one from summaries");
            state.final_review = Some(fallback_review(&state.topic, &state.summaries));
        }

        info!(
            run_id = %state.run_id,
            steps,
            retries = state.retry_count(),
            elapsed_ms = run_started.elapsed().as_millis() as u64,
            "Literature review finished"
        );
        state
    }

    async fn execute(&self, stage: Stage, state: PipelineState) -> PipelineState {
        let ctx = &self.ctx;
        match stage {
            Stage::Planner => planner::run(state, ctx).await,
            Stage::Searcher => searcher::run(state, ctx).await,
            Stage::Fetcher => fetcher::run(state, ctx).await,
            Stage::QualityGate => quality::run(state),
            Stage::ChunkEmbed => chunk_embed::run(state, ctx).await,
            Stage::Retriever => retriever::run(state, ctx).await,
            Stage::Summarizer => summarizer::run(state, ctx).await,
            Stage::Synthesizer => synthesizer::run(state, ctx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::MockLlmProvider;
    use crate::research::stages::testing::{EchoFetcher, FailingSearch, StaticSearch, context_with_llm};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        stages: Mutex<Vec<Stage>>,
        routes: Mutex<Vec<(Route, u32)>>,
    }

    impl PipelineObserver for Recorder {
        fn on_stage_start(&self, stage: Stage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_route(&self, route: Route, retry_count: u32) {
            self.routes.lock().unwrap().push((route, retry_count));
        }
    }

    #[test]
    fn test_standard_graph_shape() {
        let graph = ReviewGraph::standard();
        assert_eq!(graph.entry(), Stage::Planner);
        assert_eq!(graph.edge(Stage::Synthesizer), Edge::End);
        assert_eq!(
            graph.edge(Stage::QualityGate),
            Edge::Branch {
                retry: Stage::Searcher,
                proceed: Stage::ChunkEmbed
            }
        );
        for stage in Stage::ALL {
            assert!(graph.edges.contains_key(&stage), "missing edge for {}", stage);
        }
        assert_eq!(graph.max_steps(), 24);
    }

    #[tokio::test]
    async fn test_empty_search_retries_once() {
        let ctx = StageContext::new(
            Arc::new(MockLlmProvider::failing()),
            Arc::new(StaticSearch::new(&[])),
            Arc::new(EchoFetcher { repeat: 3 }),
        );
        let recorder = Arc::new(Recorder::default());
        let engine = ReviewEngine::new(ctx).with_observer(recorder.clone());
        let state = engine.run("quantum error correction").await;

        let stages = recorder.stages.lock().unwrap().clone();
        assert_eq!(
            stages,
            vec![
                Stage::Planner,
                Stage::Searcher,
                Stage::Fetcher,
                Stage::QualityGate,
                Stage::Searcher,
                Stage::Fetcher,
                Stage::QualityGate,
                Stage::ChunkEmbed,
                Stage::Retriever,
                Stage::Summarizer,
                Stage::Synthesizer,
            ]
        );
        assert_eq!(
            recorder.routes.lock().unwrap().clone(),
            vec![(Route::Retry, 0), (Route::Continue, 1)]
        );
        assert_eq!(state.retry_count(), 1);
        assert!(state.final_review.is_some());
    }

    #[tokio::test]
    async fn test_failing_collaborators_pass_gate_on_placeholders() {
        let recorder = Arc::new(Recorder::default());
        let engine = ReviewEngine::new(context_with_llm(Arc::new(MockLlmProvider::failing())))
            .with_observer(recorder.clone());
        let state = engine.run("quantum error correction").await;

        // Three fallback subtopics with three placeholder URLs each.
        assert_eq!(state.documents.len(), 9);
        assert_eq!(recorder.stages.lock().unwrap().clone(), Stage::ALL.to_vec());
        assert_eq!(
            recorder.routes.lock().unwrap().clone(),
            vec![(Route::Continue, 0)]
        );
        assert_eq!(state.retry_count(), 0);
        assert!(state.final_review.is_some());
    }

    #[tokio::test]
    async fn test_passing_gate_skips_retry() {
        let urls = [
            "https://a.org",
            "https://b.org",
            "https://c.org",
            "https://d.org",
            "https://e.org",
        ];
        let ctx = StageContext::new(
            Arc::new(MockLlmProvider::failing()),
            Arc::new(StaticSearch::new(&urls)),
            Arc::new(EchoFetcher { repeat: 3 }),
        );
        let recorder = Arc::new(Recorder::default());
        let state = ReviewEngine::new(ctx)
            .with_observer(recorder.clone())
            .run("t")
            .await;

        assert_eq!(recorder.stages.lock().unwrap().len(), 8);
        assert_eq!(state.retry_count(), 0);
        assert_eq!(state.quality.passed(), Some(true));
        assert_eq!(state.documents.len(), 15);
    }

    #[tokio::test]
    async fn test_step_limit_still_yields_review() {
        let graph = ReviewGraph::new(Stage::Planner, [(Stage::Planner, Edge::Next(Stage::Planner))]);
        let ctx = StageContext::new(
            Arc::new(MockLlmProvider::failing()),
            Arc::new(FailingSearch),
            Arc::new(EchoFetcher { repeat: 1 }),
        );
        let recorder = Arc::new(Recorder::default());
        let state = ReviewEngine::new(ctx)
            .with_graph(graph)
            .with_observer(recorder.clone())
            .run("t")
            .await;

        assert_eq!(recorder.stages.lock().unwrap().len(), 3);
        assert!(state.final_review.unwrap().contains("# Literature Review: t"));
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::QualityGate.to_string(), "quality_gate");
        assert_eq!(Stage::ChunkEmbed.to_string(), "chunk_embed");
    }
}
