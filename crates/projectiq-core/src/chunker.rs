//! Recursive character chunking with overlap.
//!
//! Text is split on the coarsest separator it contains (`"\n\n"`, `"\n"`,
//! `" "`, then single characters). Pieces keep their leading separator and
//! are greedily merged into windows of at most `chunk_size` characters; when
//! a window is emitted, pieces are dropped from its front until at most
//! `overlap` characters remain to seed the next one.

use std::collections::VecDeque;

use tracing::debug;

use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_OVERLAP: usize = 150;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self { Self { chunk_size: DEFAULT_CHUNK_SIZE, overlap: DEFAULT_OVERLAP } }
}

impl Chunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be greater than zero".into()));
        }
        if overlap >= chunk_size {
            return Err(Error::InvalidConfig(format!("overlap ({overlap}) must be smaller than chunk_size ({chunk_size})")));
        }
        Ok(Self { chunk_size, overlap })
    }

    pub fn from_config(config: &IndexConfig) -> Result<Self> { Self::new(config.chunk_size, config.overlap) }

    pub fn chunk_size(&self) -> usize { self.chunk_size }

    pub fn overlap(&self) -> usize { self.overlap }

    /// Split every document, carrying its metadata onto each chunk.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for (ordinal, doc) in documents.iter().enumerate() {
            let windows = self.split_text(&doc.content);
            let total_chunks = windows.len();
            chunks.extend(windows.into_iter().enumerate().map(|(chunk_index, content)| Chunk {
                id: format!("{ordinal}:{chunk_index}"),
                content,
                metadata: doc.metadata.clone(),
                chunk_index,
                total_chunks,
            }));
        }
        debug!("Split {} documents into {} chunks", documents.len(), chunks.len());
        chunks
    }

    pub fn split_text(&self, text: &str) -> Vec<String> { self.split_recursive(text, &SEPARATORS) }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = "";
        let mut finer: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() { break; }
            if text.contains(sep) {
                separator = sep;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut out = Vec::new();
        let mut fitting: Vec<String> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                out.extend(self.merge(&fitting));
                fitting.clear();
            }
            if finer.is_empty() { out.push(piece); } else { out.extend(self.split_recursive(&piece, finer)); }
        }
        if !fitting.is_empty() { out.extend(self.merge(&fitting)); }
        out
    }

    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut windows = Vec::new();
        let mut current: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;
        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !current.is_empty() {
                push_window(&mut windows, &current);
                while total > self.overlap || (total + len > self.chunk_size && total > 0) {
                    let Some((_, dropped)) = current.pop_front() else { break };
                    total -= dropped;
                }
            }
            current.push_back((piece.as_str(), len));
            total += len;
        }
        push_window(&mut windows, &current);
        windows
    }
}

fn char_len(s: &str) -> usize { s.chars().count() }

fn push_window(windows: &mut Vec<String>, pieces: &VecDeque<(&str, usize)>) {
    let joined: String = pieces.iter().map(|(p, _)| *p).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() { windows.push(trimmed.to_string()); }
}

/// Split on `separator`, re-attaching it to the front of every following piece.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() { return text.chars().map(String::from).collect(); }
    let mut parts = text.split(separator);
    let mut out = Vec::new();
    if let Some(first) = parts.next() {
        if !first.is_empty() { out.push(first.to_string()); }
    }
    out.extend(parts.map(|p| format!("{separator}{p}")));
    out
}
