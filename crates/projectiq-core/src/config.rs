use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::{DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
use crate::error::{Error, Result};
use crate::scanner::{normalize_extension, DEFAULT_EXTENSIONS};

pub const ENV_PREFIX: &str = "PROJECTIQ_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    pub data: DataConfig,
    pub index: IndexConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub completion: CompletionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub root_dir: PathBuf,
    pub extensions: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self { root_dir: PathBuf::from("data"), extensions: DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect() }
    }
}

/// Everything that must agree between a build and a later reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Embedding model identifier.
    pub model: String,
    pub chunk_size: usize,
    pub overlap: usize,
    pub collection: String,
    pub storage_path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
            collection: "project_documents".to_string(),
            storage_path: PathBuf::from("vector_db"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// BERT sentence embeddings computed locally with candle.
    #[default]
    Candle,
    /// Deterministic feature hashing; for tests and offline development.
    Hashed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    /// Directory holding `config.json`, `tokenizer.json` and the weights.
    pub model_dir: Option<PathBuf>,
    pub max_len: usize,
    /// Dimensionality of the hashed backend.
    pub hashed_dim: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self { Self { backend: EmbeddingBackend::Candle, model_dir: None, max_len: 256, hashed_dim: 384 } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self { Self { k: 3 } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is unset.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            api_key: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 60,
            max_retries: 3,
            initial_backoff_ms: 500,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let index = &self.index;
        if index.chunk_size == 0 {
            return Err(Error::InvalidConfig("index.chunk_size must be greater than zero".into()));
        }
        if index.overlap >= index.chunk_size {
            return Err(Error::InvalidConfig(format!("index.overlap ({}) must be smaller than index.chunk_size ({})", index.overlap, index.chunk_size)));
        }
        if index.collection.trim().is_empty() {
            return Err(Error::InvalidConfig("index.collection must not be empty".into()));
        }
        if index.model.trim().is_empty() {
            return Err(Error::InvalidConfig("index.model must not be empty".into()));
        }
        if self.retrieval.k == 0 {
            return Err(Error::InvalidConfig("retrieval.k must be at least 1".into()));
        }
        if self.data.extensions.is_empty() {
            return Err(Error::InvalidConfig("data.extensions must list at least one extension".into()));
        }
        if self.embedding.backend == EmbeddingBackend::Hashed && self.embedding.hashed_dim == 0 {
            return Err(Error::InvalidConfig("embedding.hashed_dim must be greater than zero".into()));
        }
        Ok(())
    }

    /// Normalize extensions and resolve relative paths against `base`.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        self.data.extensions = self.data.extensions.iter().map(|e| normalize_extension(e)).collect();
        self.data.root_dir = resolve_with_base(base, self.data.root_dir.to_string_lossy());
        self.index.storage_path = resolve_with_base(base, self.index.storage_path.to_string_lossy());
        self.embedding.model_dir = self.embedding.model_dir.map(|p| resolve_with_base(base, p.to_string_lossy()));
        self
    }
}

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    /// Layer defaults, `config.toml`, `config.<env>.toml` and `PROJECTIQ_*` variables.
    pub fn load() -> Result<Self> { Self::load_from(Path::new("config.toml")) }

    pub fn load_from(path: &Path) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let base_dir = path.parent().filter(|p| !p.as_os_str().is_empty()).map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(path));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(base_dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base_dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base_dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        Ok(Self { figment, base_dir })
    }

    /// Extract, resolve and validate the typed settings.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        let settings = settings.resolve_paths(&self.base_dir);
        settings.validate()?;
        Ok(settings)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
