use std::hash::{Hash, Hasher};

use anyhow::{ensure, Result};
use twox_hash::XxHash64;

use projectiq_core::traits::Embedder;

/// Feature-hashing embedder: deterministic, model-free, dimension configurable.
///
/// Texts sharing words land near each other, identical texts embed identically.
pub struct HashedEmbedder {
    id: String,
    dim: usize,
}

impl HashedEmbedder {
    pub fn new(dim: usize) -> Result<Self> {
        ensure!(dim > 0, "hashed embedder needs a non-zero dimension");
        Ok(Self { id: format!("hashed:xxh64:d{dim}"), dim })
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let lowered = text.to_lowercase();
        let mut tokens = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .peekable();
        if tokens.peek().is_none() {
            v[bucket(&lowered, self.dim).0] = 1.0;
            return v;
        }
        for (i, token) in tokens.enumerate() {
            let (idx, val) = bucket(token, self.dim);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

fn bucket(token: &str, dim: usize) -> (usize, f32) {
    let mut hasher = XxHash64::with_seed(0);
    token.hash(&mut hasher);
    let h = hasher.finish();
    ((h as usize) % dim, 0.5 + ((h >> 32) as u32) as f32 / u32::MAX as f32)
}

impl Embedder for HashedEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { Ok(texts.iter().map(|t| self.embed_text(t)).collect()) }
}
