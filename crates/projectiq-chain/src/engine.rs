use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use projectiq_core::chunker::Chunker;
use projectiq_core::config::Settings;
use projectiq_core::error::{EmptyIndexError, Error, Result};
use projectiq_core::scanner::{all_files, FileScanner};
use projectiq_core::traits::{CompletionService, Embedder, Retriever};
use projectiq_core::types::FileIndex;
use projectiq_embed::get_default_embedder;
use projectiq_loaders::LoaderRegistry;
use projectiq_vector::{IndexHandle, IndexInfo, VectorStore};

use crate::chain::RetrievalChain;
use crate::completion::OpenAiCompletion;
use crate::prompt::PromptTemplate;

/// Outcome of a full rebuild.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub files_scanned: usize,
    pub documents: usize,
    pub chunks: usize,
    /// Files that could not be parsed, with the reason.
    pub failures: Vec<(PathBuf, String)>,
}

pub struct ProjectIq {
    settings: Settings,
    scanner: FileScanner,
    registry: LoaderRegistry,
    chunker: Chunker,
    store: VectorStore,
    chain: RetrievalChain,
    index: Option<IndexHandle>,
    /// Why a persisted index was not loaded; cleared by the next successful sync.
    stale: Option<String>,
    /// Files skipped by the most recent sync, kept when that sync fails.
    skipped: Vec<(PathBuf, String)>,
}

impl ProjectIq {
    /// Open with the configured embedder and completion service, reloading any existing index.
    pub async fn open(settings: Settings) -> Result<Self> {
        let embedder = get_default_embedder(&settings.embedding, &settings.index.model).map_err(|e| Error::Embedding(e.to_string()))?;
        let completion = Arc::new(OpenAiCompletion::new(settings.completion.clone())?);
        Self::open_with(settings, embedder, completion).await
    }

    pub async fn open_with(settings: Settings, embedder: Arc<dyn Embedder>, completion: Arc<dyn CompletionService>) -> Result<Self> {
        settings.validate()?;
        let registry = LoaderRegistry::with_defaults();
        if let Some(ext) = settings.data.extensions.iter().find(|e| !registry.supports(e)) {
            return Err(Error::InvalidConfig(format!("no loader for extension {ext}")));
        }
        let scanner = FileScanner::new(&settings.data.extensions);
        let chunker = Chunker::from_config(&settings.index)?;
        let store = VectorStore::new(settings.index.clone(), embedder);
        let chain = RetrievalChain::new(completion, PromptTemplate::default(), settings.retrieval.k);
        let (index, stale) = match store.load().await {
            Ok(Some(handle)) => {
                info!("Loaded index '{}' with {} chunks", settings.index.collection, handle.len());
                (Some(handle), None)
            }
            Ok(None) => {
                info!("No index at {}; sync required", settings.index.storage_path.display());
                (None, None)
            }
            Err(e @ Error::StoreMismatch { .. }) => {
                warn!("Ignoring persisted index: {}; sync to rebuild", e);
                (None, Some(e.to_string()))
            }
            Err(e) => return Err(e),
        };
        Ok(Self { settings, scanner, registry, chunker, store, chain, index, stale, skipped: Vec::new() })
    }

    pub fn settings(&self) -> &Settings { &self.settings }

    pub fn has_index(&self) -> bool { self.index.is_some() }

    pub fn index(&self) -> Option<&IndexHandle> { self.index.as_ref() }

    /// Set when an index exists on disk but was built by a different embedder.
    pub fn stale_reason(&self) -> Option<&str> { self.stale.as_deref() }

    /// Files the last sync could not load, with the reason.
    pub fn skipped(&self) -> &[(PathBuf, String)] { &self.skipped }

    /// Files under the document root, grouped by extension.
    pub fn scan(&self) -> Result<FileIndex> { Ok(self.scanner.scan(&self.settings.data.root_dir)?) }

    /// Rescan, reload and re-embed everything, replacing the index.
    pub async fn sync(&mut self) -> Result<SyncReport> {
        let file_index = self.scan()?;
        let files_scanned = all_files(&file_index).len();
        info!("Scanned {} files under {}", files_scanned, self.settings.data.root_dir.display());

        let registry = self.registry.clone();
        let ingest = tokio::task::spawn_blocking(move || registry.load_index(&file_index))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        let chunks = self.chunker.split_documents(&ingest.documents);
        self.skipped = ingest.failures.clone();
        if chunks.is_empty() {
            warn!("Nothing to index: {} of {} files failed to load", self.skipped.len(), files_scanned);
            for (path, reason) in &self.skipped {
                warn!("  {}: {}", path.display(), reason);
            }
            return Err(EmptyIndexError::NoChunks.into());
        }

        let handle = self.store.build(&chunks).await?;
        self.index = Some(handle);
        self.stale = None;
        let report = SyncReport { files_scanned, documents: ingest.documents.len(), chunks: chunks.len(), failures: ingest.failures };
        info!("Sync complete: {} files, {} documents, {} chunks, {} skipped", report.files_scanned, report.documents, report.chunks, report.failures.len());
        Ok(report)
    }

    pub async fn answer(&self, question: &str) -> Result<String> {
        self.chain.answer(question, self.index.as_ref().map(|h| h as &dyn Retriever)).await
    }

    /// The rendered prompt for `question`, without calling the model.
    pub async fn prompt_for(&self, question: &str) -> Result<String> {
        self.chain.prompt_for(question, self.index.as_ref().map(|h| h as &dyn Retriever)).await
    }

    pub async fn status(&self) -> Result<Option<IndexInfo>> { self.store.status().await }
}
