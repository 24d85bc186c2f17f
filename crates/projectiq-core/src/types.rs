//! Domain types shared by loaders, chunker, store and chain.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub type ChunkId = String;
pub type Meta = BTreeMap<String, String>;

/// Extension (lowercase, leading dot) → absolute paths found under the root.
pub type FileIndex = BTreeMap<String, Vec<PathBuf>>;

pub const META_SOURCE: &str = "source";
pub const META_SHEET: &str = "sheet";
pub const META_PAGE: &str = "page";
pub const META_TABLE: &str = "table";
pub const META_SUBJECT: &str = "subject";
pub const META_SENDER: &str = "sender";
pub const META_DATE: &str = "date";

/// A normalized unit of ingested text.
///
/// `metadata` always carries `source`, the originating file path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: Meta,
}

impl Document {
    pub fn new(content: impl Into<String>, source: &Path) -> Self {
        let mut metadata = Meta::new();
        metadata.insert(META_SOURCE.to_string(), source.to_string_lossy().to_string());
        Self { content: content.into(), metadata }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn source(&self) -> &str {
        self.metadata.get(META_SOURCE).map(String::as_str).unwrap_or_default()
    }
}

/// A retrieval-sized window of a [`Document`].
///
/// - `id`: `"<document ordinal>:<chunk index>"`, unique within one sync
/// - `content`: the text payload, at most `chunk_size` characters
/// - `metadata`: copied verbatim from the parent document
/// - `chunk_index`/`total_chunks`: position within the parent document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub content: String,
    pub metadata: Meta,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

impl Chunk {
    pub fn source(&self) -> &str {
        self.metadata.get(META_SOURCE).map(String::as_str).unwrap_or_default()
    }
}

/// A chunk returned by a search. `score` is `1 - cosine distance`; higher is better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of a caller-owned conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// Append-only chat history owned by the presentation layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(Turn { role, content: content.into() });
    }

    pub fn turns(&self) -> &[Turn] { &self.turns }

    pub fn len(&self) -> usize { self.turns.len() }

    pub fn is_empty(&self) -> bool { self.turns.is_empty() }
}
