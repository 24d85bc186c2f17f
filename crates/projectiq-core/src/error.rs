use std::path::{Path, PathBuf};

use thiserror::Error;

/// The document root could not be enumerated.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Document root not found: {0}")]
    NotFound(PathBuf),

    #[error("Document root is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// A single file failed to parse. Recovered per file during ingestion.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("No loader registered for {path}")]
    Unsupported { path: PathBuf },
}

impl LoaderError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }

    pub fn parse(path: &Path, reason: impl ToString) -> Self {
        Self::Parse { path: path.to_path_buf(), reason: reason.to_string() }
    }

    /// The file this failure belongs to.
    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. } | Self::Parse { path, .. } | Self::Unsupported { path } => path,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmptyIndexError {
    #[error("Refusing to build an index from zero chunks")]
    NoChunks,

    #[error("No index available; run sync first")]
    NotBuilt,
}

/// Failures of the external completion service.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("No API key configured (set completion.api_key or ${0})")]
    MissingApiKey(String),

    #[error("Completion request timed out after {0}s")]
    Timeout(u64),

    #[error("Completion transport error: {0}")]
    Transport(String),

    #[error("Completion service rate limited the request")]
    RateLimited,

    #[error("Completion service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed completion response: {0}")]
    Malformed(String),
}

impl CompletionError {
    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Transport(_) | Self::RateLimited => true,
            Self::Status { status, .. } => *status >= 500,
            Self::MissingApiKey(_) | Self::Malformed(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    EmptyIndex(#[from] EmptyIndexError),

    #[error("Index was built with embedder '{found}', but '{expected}' is configured")]
    StoreMismatch { expected: String, found: String },

    #[error("Vector store failure: {0}")]
    Store(String),

    #[error("Embedding failure: {0}")]
    Embedding(String),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("Question must not be empty")]
    InvalidQuestion,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the caller should ask the user to sync before asking again.
    pub fn needs_sync(&self) -> bool {
        matches!(self, Self::EmptyIndex(EmptyIndexError::NotBuilt))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
