//! Literature review pipeline.
//!
//! A run moves one owned [`PipelineState`] through eight stages:
//! 1. **Plan** subtopics for the topic
//! 2. **Search** the web per subtopic
//! 3. **Fetch** every result page
//! 4. **Gate** on document count, retrying search once if too few
//! 5. **Chunk & embed** documents into a vector index
//! 6. **Retrieve** relevant chunks per subtopic
//! 7. **Summarize** each subtopic
//! 8. **Synthesize** the final review
//!
//! Every stage degrades to a deterministic fallback when a collaborator
//! fails, so a run always ends with a review.

pub mod chunking;
pub mod engine;
pub mod index;
pub mod output;
pub mod prompts;
pub mod records;
pub mod session;
pub mod stages;

pub use engine::{Edge, NoopObserver, PipelineObserver, ReviewEngine, ReviewGraph, Stage};
pub use index::VectorIndex;
pub use records::{Chunk, ChunkMetadata, Document, DocumentOrigin, Subtopic, Summary};
pub use session::{ChunkingOutcome, PipelineState, QualityStatus, RunSummary, SubtopicUrls};
pub use stages::StageContext;
pub use stages::quality::Route;
