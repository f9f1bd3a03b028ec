//! Recursive character splitter.
//!
//! Text is split on the highest-priority separator it contains (paragraph,
//! line, sentence, word, character) and the pieces are merged back into
//! windows of at most `chunk_size` characters that share roughly `overlap`
//! characters with their predecessor. Lengths are counted in `char`s.

use super::records::{Chunk, Document};
use std::collections::VecDeque;

/// Window size in characters.
pub const CHUNK_SIZE: usize = 1000;
/// Characters shared between neighbouring windows.
pub const CHUNK_OVERLAP: usize = 200;
/// Split points in priority order. The empty separator splits into characters.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

/// Return the longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    overlap: usize,
    separators: Vec<String>,
}

impl Default for RecursiveSplitter {
    fn default() -> Self {
        Self::new(CHUNK_SIZE, CHUNK_OVERLAP)
    }
}

impl RecursiveSplitter {
    /// `overlap` is clamped below `chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split `text` into trimmed, non-empty windows.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &self.separators)
    }

    /// Split every document and tag each window with its source.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| {
                self.split(&doc.content)
                    .into_iter()
                    .map(move |text| Chunk::from_document(doc, text))
            })
            .collect()
    }

    fn split_with(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().cloned().unwrap_or_default();
        let mut remaining: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = String::new();
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate.clone();
                remaining = &separators[i + 1..];
                break;
            }
        }

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator.as_str())
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<String> = Vec::new();
        for piece in pieces {
            if char_len(&piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting, &separator));
                fitting.clear();
            }
            if remaining.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_with(&piece, remaining));
            }
        }
        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting, &separator));
        }
        chunks
    }

    /// Greedily pack pieces into windows, carrying a tail of up to `overlap`
    /// characters into the next window.
    fn merge(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut windows = Vec::new();
        let mut current: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            let joiner = |current: &VecDeque<(&str, usize)>| {
                if current.is_empty() { 0 } else { sep_len }
            };

            if total + len + joiner(&current) > self.chunk_size && !current.is_empty() {
                push_window(&mut windows, &current, separator);
                while !current.is_empty()
                    && (total > self.overlap
                        || total + len + joiner(&current) > self.chunk_size)
                {
                    let extra = if current.len() > 1 { sep_len } else { 0 };
                    if let Some((_, first_len)) = current.pop_front() {
                        total = total.saturating_sub(first_len + extra);
                    }
                }
            }

            total += len + joiner(&current);
            current.push_back((piece.as_str(), len));
        }
        push_window(&mut windows, &current, separator);
        windows
    }
}

fn push_window(windows: &mut Vec<String>, current: &VecDeque<(&str, usize)>, separator: &str) {
    let joined = current
        .iter()
        .map(|(s, _)| *s)
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        windows.push(trimmed.to_string());
    }
}
