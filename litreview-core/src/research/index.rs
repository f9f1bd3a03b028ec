//! In-memory cosine-similarity index over embedded chunks.

use super::records::Chunk;
use crate::embeddings::Embedder;
use crate::error::EmbeddingError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// Nearest-neighbour index built once per run from every chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    dimensions: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Create an empty index for vectors of the given width.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            entries: Vec::new(),
        }
    }

    /// Embed `chunks` and index them, preserving chunk order.
    pub async fn build(chunks: &[Chunk], embedder: &dyn Embedder) -> Result<Self, EmbeddingError> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;
        Self::from_vectors(embedder.dimensions(), chunks.to_vec(), vectors)
    }

    /// Assemble an index from precomputed vectors.
    pub fn from_vectors(
        dimensions: usize,
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, EmbeddingError> {
        if chunks.len() != vectors.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: chunks.len(),
                got: vectors.len(),
            });
        }
        let mut index = Self::new(dimensions);
        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            index.insert(chunk, vector)?;
        }
        Ok(index)
    }

    pub fn insert(&mut self, chunk: Chunk, vector: Vec<f32>) -> Result<(), EmbeddingError> {
        if vector.len() != self.dimensions {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimensions,
                got: vector.len(),
            });
        }
        self.entries.push(IndexEntry { chunk, vector });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Return up to `k` chunks ranked by cosine similarity to `query`.
    ///
    /// Ties keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Chunk>, EmbeddingError> {
        if query.len() != self.dimensions {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query, &e.vector)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, _)| self.entries[i].chunk.clone())
            .collect())
    }

    /// Append every entry of `other`. Both indexes must share dimensions.
    pub fn merge(&mut self, other: VectorIndex) -> Result<(), EmbeddingError> {
        if other.dimensions != self.dimensions {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimensions,
                got: other.dimensions,
            });
        }
        self.entries.extend(other.entries);
        Ok(())
    }

    /// Persist the index as JSON.
    pub fn save(&self, path: &Path) -> Result<(), EmbeddingError> {
        let persist_err = |message: String| EmbeddingError::Persistence {
            path: path.to_path_buf(),
            message,
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| persist_err(e.to_string()))?;
        }
        let json = serde_json::to_vec(self).map_err(|e| persist_err(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| persist_err(e.to_string()))
    }

    /// Load an index written by [`VectorIndex::save`].
    pub fn load(path: &Path) -> Result<Self, EmbeddingError> {
        let persist_err = |message: String| EmbeddingError::Persistence {
            path: path.to_path_buf(),
            message,
        };
        let bytes = std::fs::read(path).map_err(|e| persist_err(e.to_string()))?;
        let index: VectorIndex =
            serde_json::from_slice(&bytes).map_err(|e| persist_err(e.to_string()))?;
        if let Some(bad) = index.entries.iter().find(|e| e.vector.len() != index.dimensions) {
            return Err(EmbeddingError::DimensionMismatch {
                expected: index.dimensions,
                got: bad.vector.len(),
            });
        }
        Ok(index)
    }
}

/// Cosine similarity; zero when either vector has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}
