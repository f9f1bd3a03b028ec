//! Pipeline state threaded through the review graph.
//!
//! The state is owned: each stage takes it by value and hands it back, so
//! no stage keeps a handle on data another stage will later replace.

use super::index::VectorIndex;
use super::records::{Chunk, Document, Subtopic, Summary};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Outcome of the quality gate, replacing loose optional control fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QualityStatus {
    /// The gate has not judged the current document set yet.
    Pending { retry_count: u32 },
    /// The gate judged the current document set.
    Checked { passed: bool, retry_count: u32 },
}

impl Default for QualityStatus {
    fn default() -> Self {
        QualityStatus::Pending { retry_count: 0 }
    }
}

impl QualityStatus {
    pub fn retry_count(&self) -> u32 {
        match *self {
            QualityStatus::Pending { retry_count } | QualityStatus::Checked { retry_count, .. } => {
                retry_count
            }
        }
    }

    /// `None` until the gate has run.
    pub fn passed(&self) -> Option<bool> {
        match *self {
            QualityStatus::Pending { .. } => None,
            QualityStatus::Checked { passed, .. } => Some(passed),
        }
    }
}

/// How the chunk set and index were produced.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChunkingOutcome {
    #[default]
    Pending,
    /// Windowed chunks with a vector index.
    Indexed,
    /// No documents, so no chunks and no index.
    Empty,
    /// One truncated chunk per document and no index.
    Fallback { reason: String },
}

impl ChunkingOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self, ChunkingOutcome::Fallback { .. })
    }
}

/// URLs found for one subtopic, in backend order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtopicUrls {
    pub subtopic: String,
    pub urls: Vec<String>,
}

/// Everything one run knows, progressively filled in stage order.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub run_id: Uuid,
    pub topic: String,
    pub subtopics: Vec<Subtopic>,
    pub search_results: Vec<SubtopicUrls>,
    pub documents: Vec<Document>,
    pub chunks: Vec<Chunk>,
    pub vector_index: Option<VectorIndex>,
    pub chunking: ChunkingOutcome,
    pub retrieved: HashMap<String, Vec<Chunk>>,
    pub summaries: Vec<Summary>,
    pub final_review: Option<String>,
    pub quality: QualityStatus,
}

impl PipelineState {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            topic: topic.into(),
            subtopics: Vec::new(),
            search_results: Vec::new(),
            documents: Vec::new(),
            chunks: Vec::new(),
            vector_index: None,
            chunking: ChunkingOutcome::Pending,
            retrieved: HashMap::new(),
            summaries: Vec::new(),
            final_review: None,
            quality: QualityStatus::default(),
        }
    }

    pub fn retry_count(&self) -> u32 {
        self.quality.retry_count()
    }

    /// Total URLs across every subtopic.
    pub fn url_count(&self) -> usize {
        self.search_results.iter().map(|s| s.urls.len()).sum()
    }

    /// Reset the gate for another search/fetch pass.
    pub fn begin_retry(&mut self) {
        self.quality = QualityStatus::Pending {
            retry_count: self.retry_count() + 1,
        };
    }

    /// Counts describing the run so far.
    pub fn summary(&self) -> RunSummary {
        let placeholder_documents = self.documents.iter().filter(|d| d.is_placeholder()).count();
        RunSummary {
            subtopics: self.subtopics.len(),
            urls: self.url_count(),
            documents: self.documents.len(),
            placeholder_documents,
            chunks: self.chunks.len(),
            indexed: self.vector_index.is_some(),
            summaries: self.summaries.len(),
            retries: self.retry_count(),
        }
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub subtopics: usize,
    pub urls: usize,
    pub documents: usize,
    pub placeholder_documents: usize,
    pub chunks: usize,
    pub indexed: bool,
    pub summaries: usize,
    pub retries: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::records::DocumentOrigin;

    #[test]
    fn test_new_state_is_empty() {
        let state = PipelineState::new("quantum error correction");
        assert_eq!(state.topic, "quantum error correction");
        assert!(state.subtopics.is_empty());
        assert!(state.documents.is_empty());
        assert!(state.vector_index.is_none());
        assert!(state.final_review.is_none());
        assert_eq!(state.chunking, ChunkingOutcome::Pending);
        assert_eq!(state.quality.passed(), None);
        assert_eq!(state.retry_count(), 0);
    }

    #[test]
    fn test_begin_retry_increments_and_resets_gate() {
        let mut state = PipelineState::new("t");
        state.quality = QualityStatus::Checked {
            passed: false,
            retry_count: 0,
        };
        state.begin_retry();
        assert_eq!(state.quality, QualityStatus::Pending { retry_count: 1 });
    }

    #[test]
    fn test_summary_counts_placeholders() {
        let mut state = PipelineState::new("t");
        state.search_results = vec![SubtopicUrls {
            subtopic: "A".into(),
            urls: vec!["https://a".into(), "https://b".into()],
        }];
        for (url, origin) in [
            ("https://a", DocumentOrigin::Fetched),
            ("https://b", DocumentOrigin::Placeholder),
        ] {
            state.documents.push(Document {
                url: url.into(),
                title: "Article about A".into(),
                content: "c".into(),
                subtopic: "A".into(),
                origin,
            });
        }
        let summary = state.summary();
        assert_eq!(summary.urls, 2);
        assert_eq!(summary.documents, 2);
        assert_eq!(summary.placeholder_documents, 1);
        assert!(!summary.indexed);
    }

    #[test]
    fn test_quality_status_serde_tagged() {
        let json = serde_json::to_string(&QualityStatus::Checked {
            passed: true,
            retry_count: 1,
        })
        .unwrap();
        assert_eq!(json, r#"{"status":"checked","passed":true,"retry_count":1}"#);
    }
}
