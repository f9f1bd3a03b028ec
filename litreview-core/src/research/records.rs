//! Records produced and consumed by the pipeline stages.

use serde::{Deserialize, Serialize};

/// One facet of the research topic with its own search query.
///
/// `name` is the join key between search results, retrieved chunks and
/// summaries, so it is unique within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtopic {
    pub name: String,
    pub search_query: String,
    #[serde(default)]
    pub rationale: String,
}

impl Subtopic {
    pub fn new(
        name: impl Into<String>,
        search_query: impl Into<String>,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            search_query: search_query.into(),
            rationale: rationale.into(),
        }
    }

    /// A subtopic is usable when both its name and query carry text.
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() && !self.search_query.trim().is_empty()
    }
}

/// Where a document's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentOrigin {
    Fetched,
    Placeholder,
}

/// A fetched (or substituted) page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub url: String,
    pub title: String,
    pub content: String,
    pub subtopic: String,
    pub origin: DocumentOrigin,
}

impl Document {
    pub fn is_placeholder(&self) -> bool {
        self.origin == DocumentOrigin::Placeholder
    }
}

/// Source back-reference carried by each chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub url: String,
    pub title: String,
    pub subtopic: String,
}

/// A bounded slice of document text, the unit indexed for retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Build a chunk that points back at `doc`.
    pub fn from_document(doc: &Document, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: ChunkMetadata {
                url: doc.url.clone(),
                title: doc.title.clone(),
                subtopic: doc.subtopic.clone(),
            },
        }
    }
}

/// Per-subtopic synthesis produced by the summarizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub subtopic: String,
    pub summary: String,
    #[serde(default)]
    pub key_findings: Vec<String>,
    #[serde(default)]
    pub sources: Vec<String>,
}
