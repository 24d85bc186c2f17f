//! projectiq-loaders
//!
//! Per-format parsers turning one file into normalized [`Document`]s, and a
//! registry dispatching on file extension.

pub mod email;
pub mod excel;
pub mod pdf;
pub mod text;
pub mod word;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use projectiq_core::error::LoaderError;
use projectiq_core::scanner::{extension_of, normalize_extension};
use projectiq_core::traits::DocumentLoader;
use projectiq_core::types::{Document, FileIndex};

pub use email::EmailLoader;
pub use excel::ExcelLoader;
pub use pdf::PdfLoader;
pub use text::TextLoader;
pub use word::WordLoader;

/// Documents produced by one ingestion pass plus the files that were skipped.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub documents: Vec<Document>,
    pub files_loaded: usize,
    pub failures: Vec<(PathBuf, String)>,
}

#[derive(Clone, Default)]
pub struct LoaderRegistry {
    loaders: BTreeMap<String, Arc<dyn DocumentLoader>>,
}

impl LoaderRegistry {
    pub fn new() -> Self { Self::default() }

    /// Word, spreadsheet, PDF, email and plain text loaders.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(WordLoader));
        registry.register(Arc::new(ExcelLoader));
        registry.register(Arc::new(PdfLoader));
        registry.register(Arc::new(EmailLoader));
        registry.register(Arc::new(TextLoader));
        registry
    }

    /// Register `loader` for every extension it claims, replacing earlier entries.
    pub fn register(&mut self, loader: Arc<dyn DocumentLoader>) {
        for ext in loader.extensions() {
            self.loaders.insert(normalize_extension(ext), Arc::clone(&loader));
        }
    }

    pub fn get(&self, extension: &str) -> Option<&Arc<dyn DocumentLoader>> {
        self.loaders.get(&normalize_extension(extension))
    }

    pub fn supports(&self, extension: &str) -> bool { self.get(extension).is_some() }

    pub fn extensions(&self) -> impl Iterator<Item = &str> { self.loaders.keys().map(String::as_str) }

    pub fn load_file(&self, path: &Path) -> Result<Vec<Document>, LoaderError> {
        let loader = extension_of(path)
            .and_then(|ext| self.loaders.get(&ext))
            .ok_or_else(|| LoaderError::Unsupported { path: path.to_path_buf() })?;
        debug!("Loading {}", path.display());
        loader.load(path)
    }

    /// Load every file of `index`; a failing file is logged and skipped.
    pub fn load_index(&self, index: &FileIndex) -> IngestReport {
        let mut report = IngestReport::default();
        for (ext, paths) in index {
            for path in paths {
                match self.load_file(path) {
                    Ok(docs) => {
                        debug!("{}: {} documents", path.display(), docs.len());
                        report.files_loaded += 1;
                        report.documents.extend(docs);
                    }
                    Err(e) => {
                        warn!("Skipping {} file: {}", ext, e);
                        report.failures.push((path.clone(), e.to_string()));
                    }
                }
            }
        }
        info!("Loaded {} documents from {} files ({} skipped)", report.documents.len(), report.files_loaded, report.failures.len());
        report
    }
}

pub(crate) fn read_bytes(path: &Path) -> Result<Vec<u8>, LoaderError> {
    std::fs::read(path).map_err(|e| LoaderError::io(path, e))
}
