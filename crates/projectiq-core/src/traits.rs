use std::path::Path;

use async_trait::async_trait;

use crate::error::{CompletionError, LoaderError, Result};
use crate::types::{Document, RetrievedChunk};

/// Parses one file into zero or more documents.
pub trait DocumentLoader: Send + Sync {
    /// Extensions handled by this loader, lowercase with a leading dot.
    fn extensions(&self) -> &[&str];
    fn load(&self, path: &Path) -> std::result::Result<Vec<Document>, LoaderError>;
}

pub trait Embedder: Send + Sync {
    /// Stable identifier for the model/config (e.g., `candle:all-MiniLM-L6-v2:d384`).
    fn embedder_id(&self) -> &str;
    /// Embedding dimensionality (D).
    fn dim(&self) -> usize;
    /// Maximum token length fed to the model.
    fn max_len(&self) -> usize;
    /// Compute L2-normalized embeddings for a batch of input texts.
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>>;
}

/// External LLM completion: rendered prompt in, raw text out.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, CompletionError>;
}
