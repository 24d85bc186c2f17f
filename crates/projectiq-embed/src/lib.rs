//! projectiq-embed
//!
//! Sentence embeddings for chunks and queries: a BERT encoder run with candle
//! (all-MiniLM-L6-v2 by default) and a hashed embedder for offline use.

pub mod device;
pub mod hashed;
pub mod pool;
pub mod tokenize;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use projectiq_core::config::{EmbeddingBackend, EmbeddingConfig};
use projectiq_core::traits::Embedder;

pub use device::select_device;
pub use hashed::HashedEmbedder;
pub use pool::masked_mean_l2;
pub use tokenize::tokenize_batch;

/// Chunks per forward pass.
const BATCH_SIZE: usize = 32;

pub struct EmbeddingModel {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    id: String,
    dim: usize,
    max_len: usize,
}

impl EmbeddingModel {
    /// Load `config.json`, `tokenizer.json` and `model.safetensors` (or
    /// `pytorch_model.bin`) from `model_dir`.
    pub fn load(model_dir: &Path, model_name: &str, max_len: usize) -> Result<Self> {
        let device = select_device();
        info!("Loading embedding model {} from {}", model_name, model_dir.display());

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let config: BertConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)?)
            .map_err(|e| anyhow!("Failed to parse {}: {}", config_path.display(), e))?;

        let safetensors = model_dir.join("model.safetensors");
        let pickle = model_dir.join("pytorch_model.bin");
        let vb = if safetensors.exists() {
            debug!("Reading weights from {}", safetensors.display());
            VarBuilder::from_buffered_safetensors(std::fs::read(&safetensors)?, DType::F32, &device)?
        } else if pickle.exists() {
            debug!("Reading weights from {}", pickle.display());
            let weights: HashMap<String, Tensor> = candle_core::pickle::read_all(&pickle)?.into_iter().collect();
            VarBuilder::from_tensors(weights, DType::F32, &device)
        } else {
            bail!("No model.safetensors or pytorch_model.bin in {}", model_dir.display());
        };
        let model = BertModel::load(vb, &config)?;
        let dim = config.hidden_size;
        let max_len = max_len.min(config.max_position_embeddings);
        info!("Embedding model ready (dim={}, max_len={})", dim, max_len);

        Ok(Self { model, tokenizer, device, id: format!("candle:{model_name}:d{dim}"), dim, max_len })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let (input_ids, attention_mask) = tokenize_batch(&self.tokenizer, texts, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        Ok(pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2()?)
    }
}

impl Embedder for EmbeddingModel {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            out.extend(self.embed_chunk(batch)?);
        }
        Ok(out)
    }
}

/// Build the embedder selected by `config.backend`.
pub fn get_default_embedder(config: &EmbeddingConfig, model_name: &str) -> Result<Arc<dyn Embedder>> {
    match config.backend {
        EmbeddingBackend::Hashed => {
            info!("Using hashed embedder (dim={})", config.hashed_dim);
            Ok(Arc::new(HashedEmbedder::new(config.hashed_dim)?))
        }
        EmbeddingBackend::Candle => {
            let dir = config
                .model_dir
                .as_deref()
                .ok_or_else(|| anyhow!("embedding.model_dir must point at a local copy of {}", model_name))?;
            Ok(Arc::new(EmbeddingModel::load(dir, model_name, config.max_len)?))
        }
    }
}
