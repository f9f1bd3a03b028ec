//! Quality gate: the one branch point of the review graph.

use crate::research::session::{PipelineState, QualityStatus};
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

pub const MIN_TOTAL_DOCS: usize = 5;
pub const MIN_DOCS_PER_SUBTOPIC: f64 = 0.5;
/// Extra search/fetch passes allowed per run.
pub const MAX_RETRIES: u32 = 1;

/// Where the graph goes after the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Retry,
    Continue,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Retry => write!(f, "retry"),
            Route::Continue => write!(f, "continue"),
        }
    }
}

/// Whether `documents` documents are enough evidence for `subtopics` subtopics.
pub fn evaluate(documents: usize, subtopics: usize) -> bool {
    let per_subtopic = documents as f64 / subtopics.max(1) as f64;
    documents >= MIN_TOTAL_DOCS && per_subtopic >= MIN_DOCS_PER_SUBTOPIC
}

pub fn run(mut state: PipelineState) -> PipelineState {
    let passed = evaluate(state.documents.len(), state.subtopics.len());
    let retry_count = state.retry_count();
    if passed {
        info!(documents = state.documents.len(), "Quality check: PASSED");
    } else {
        warn!(
            documents = state.documents.len(),
            subtopics = state.subtopics.len(),
            retry_count,
            "Quality check: low document count"
        );
    }
    state.quality = QualityStatus::Checked {
        passed,
        retry_count,
    };
    state
}

pub fn route_after_quality(status: &QualityStatus) -> Route {
    match *status {
        QualityStatus::Checked {
            passed: false,
            retry_count,
        } if retry_count < MAX_RETRIES => Route::Retry,
        _ => Route::Continue,
    }
}

/// Warning for a failed gate, worded after the route actually taken.
pub fn low_count_notice(route: Route) -> &'static str {
    match route {
        Route::Retry => "Quality check: low document count, retrying search",
        Route::Continue => "Quality check: low document count, proceeding",
    }
}
