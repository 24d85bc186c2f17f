//! Build, publish and reopen the persisted chunk collection.
//!
//! A rebuild writes a complete database into a staging directory next to
//! `storage_path` and then swaps it into place, so readers never observe a
//! half-written collection. An exclusive lock file serializes rebuilds.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::{Connection, Table};
use tracing::{debug, info, warn};

use projectiq_core::config::IndexConfig;
use projectiq_core::error::{EmptyIndexError, Error, Result};
use projectiq_core::traits::{Embedder, Retriever};
use projectiq_core::types::{Chunk, RetrievedChunk};

use crate::search::nearest;
use crate::table::{get_meta, meta_table_name, open_db, set_meta, table_exists, META_BUILT_AT, META_CHUNK_COUNT, META_DIM, META_EMBEDDER_ID};
use crate::writer::write_chunks;

/// Texts per embedding call during a build.
const EMBED_BATCH: usize = 32;

fn store_err(e: impl std::fmt::Display) -> Error { Error::Store(e.to_string()) }

/// What the `meta` table says about a built collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub collection: String,
    pub embedder_id: String,
    pub dim: usize,
    pub chunk_count: usize,
    pub built_at: Option<String>,
}

pub struct VectorStore {
    config: IndexConfig,
    embedder: Arc<dyn Embedder>,
}

impl VectorStore {
    pub fn new(config: IndexConfig, embedder: Arc<dyn Embedder>) -> Self { Self { config, embedder } }

    pub fn config(&self) -> &IndexConfig { &self.config }

    /// Embed `chunks` and replace the whole collection with them.
    pub async fn build(&self, chunks: &[Chunk]) -> Result<IndexHandle> {
        if chunks.is_empty() {
            return Err(EmptyIndexError::NoChunks.into());
        }
        let target = self.config.storage_path.clone();
        let parent = target.parent().filter(|p| !p.as_os_str().is_empty()).map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        let name = target
            .file_name()
            .ok_or_else(|| Error::InvalidConfig(format!("index.storage_path has no final component: {}", target.display())))?
            .to_string_lossy()
            .to_string();
        fs::create_dir_all(&parent)?;

        let _lock = RebuildLock::acquire(parent.join(format!("{name}.lock")))?;
        info!("Rebuilding collection '{}' with {} chunks", self.config.collection, chunks.len());

        let embeddings = self.embed_all(chunks).await?;
        let staging = parent.join(format!(".{name}.staging-{}", std::process::id()));
        if staging.exists() { fs::remove_dir_all(&staging)?; }

        if let Err(e) = self.write_staging(&staging, chunks, &embeddings).await {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }
        publish(&staging, &target, &parent.join(format!(".{name}.retired-{}", std::process::id())))?;
        info!("Published collection '{}' at {}", self.config.collection, target.display());

        self.load().await?.ok_or_else(|| Error::Store(format!("collection '{}' missing right after publish", self.config.collection)))
    }

    async fn embed_all(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let pb = ProgressBar::new(chunks.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}") {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message("embedding");
        let dim = self.embedder.dim();
        let mut out = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = embed_blocking(Arc::clone(&self.embedder), texts).await?;
            if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
                pb.abandon();
                return Err(Error::Embedding(format!("embedder returned {} dimensions, expected {}", bad.len(), dim)));
            }
            out.extend(vectors);
            pb.inc(batch.len() as u64);
        }
        pb.finish_with_message("embedded");
        Ok(out)
    }

    async fn write_staging(&self, staging: &Path, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        let conn = open_db(staging).await.map_err(store_err)?;
        let collection = &self.config.collection;
        write_chunks(&conn, collection, chunks, embeddings, self.embedder.dim()).await.map_err(store_err)?;

        let meta = meta_table_name(collection);
        let dim = self.embedder.dim().to_string();
        let count = chunks.len().to_string();
        let built_at = Utc::now().to_rfc3339();
        for (key, value) in [
            (META_EMBEDDER_ID, self.embedder.embedder_id()),
            (META_DIM, dim.as_str()),
            (META_CHUNK_COUNT, count.as_str()),
            (META_BUILT_AT, built_at.as_str()),
        ] {
            set_meta(&conn, &meta, key, value).await.map_err(store_err)?;
        }
        debug!("Staged collection '{}' at {}", collection, staging.display());
        Ok(())
    }

    /// Reopen a previously built collection; `None` when nothing has been built yet.
    pub async fn load(&self) -> Result<Option<IndexHandle>> {
        let path = &self.config.storage_path;
        if !path.is_dir() {
            return Ok(None);
        }
        let conn = open_db(path).await.map_err(store_err)?;
        let collection = &self.config.collection;
        if !table_exists(&conn, collection).await.map_err(store_err)? {
            return Ok(None);
        }
        let info = read_info(&conn, collection).await?;
        let expected = self.embedder.embedder_id();
        if info.embedder_id != expected || info.dim != self.embedder.dim() {
            return Err(Error::StoreMismatch { expected: format!("{} (dim {})", expected, self.embedder.dim()), found: format!("{} (dim {})", info.embedder_id, info.dim) });
        }
        let table = conn.open_table(collection).execute().await.map_err(store_err)?;
        debug!("Loaded collection '{}' ({} chunks)", collection, info.chunk_count);
        Ok(Some(IndexHandle { table, embedder: Arc::clone(&self.embedder), info }))
    }

    /// Meta of the persisted collection without checking it against the embedder.
    pub async fn status(&self) -> Result<Option<IndexInfo>> {
        let path = &self.config.storage_path;
        if !path.is_dir() {
            return Ok(None);
        }
        let conn = open_db(path).await.map_err(store_err)?;
        if !table_exists(&conn, &self.config.collection).await.map_err(store_err)? {
            return Ok(None);
        }
        read_info(&conn, &self.config.collection).await.map(Some)
    }
}

async fn read_info(conn: &Connection, collection: &str) -> Result<IndexInfo> {
    let meta = meta_table_name(collection);
    let embedder_id = meta_value(conn, &meta, META_EMBEDDER_ID).await?.unwrap_or_default();
    let dim = meta_value(conn, &meta, META_DIM).await?.and_then(|d| d.parse().ok()).unwrap_or(0);
    let chunk_count = match meta_value(conn, &meta, META_CHUNK_COUNT).await?.and_then(|c| c.parse().ok()) {
        Some(n) => n,
        None => conn.open_table(collection).execute().await.map_err(store_err)?.count_rows(None).await.map_err(store_err)?,
    };
    let built_at = meta_value(conn, &meta, META_BUILT_AT).await?;
    Ok(IndexInfo { collection: collection.to_string(), embedder_id, dim, chunk_count, built_at })
}

async fn meta_value(conn: &Connection, meta: &str, key: &str) -> Result<Option<String>> {
    get_meta(conn, meta, key).await.map_err(store_err)
}

async fn embed_blocking(embedder: Arc<dyn Embedder>, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
    tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
        .await
        .map_err(|e| Error::Embedding(format!("embedding task failed: {e}")))?
        .map_err(|e| Error::Embedding(e.to_string()))
}

/// Move `staging` to `target`, retiring whatever was there.
fn publish(staging: &Path, target: &Path, retired: &Path) -> io::Result<()> {
    if !target.exists() {
        return fs::rename(staging, target);
    }
    if retired.exists() { fs::remove_dir_all(retired)?; }
    fs::rename(target, retired)?;
    if let Err(e) = fs::rename(staging, target) {
        let _ = fs::rename(retired, target);
        return Err(e);
    }
    if let Err(e) = fs::remove_dir_all(retired) {
        warn!("Could not remove retired index {}: {}", retired.display(), e);
    }
    Ok(())
}

struct RebuildLock {
    path: PathBuf,
}

impl RebuildLock {
    fn acquire(path: PathBuf) -> Result<Self> {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(Error::Store(format!(
                "another rebuild is in progress (lock file {} exists; remove it if no sync is running)",
                path.display()
            ))),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for RebuildLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Could not remove lock file {}: {}", self.path.display(), e);
        }
    }
}

/// A queryable, read-only view of a built collection.
#[derive(Clone)]
pub struct IndexHandle {
    table: Table,
    embedder: Arc<dyn Embedder>,
    info: IndexInfo,
}

impl IndexHandle {
    pub fn info(&self) -> &IndexInfo { &self.info }

    pub fn len(&self) -> usize { self.info.chunk_count }

    pub fn is_empty(&self) -> bool { self.info.chunk_count == 0 }

    /// The `k` chunks closest to `query`, best first.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut vectors = embed_blocking(Arc::clone(&self.embedder), vec![query.to_string()]).await?;
        let query_vec = vectors.pop().ok_or_else(|| Error::Embedding("embedder returned no vector".into()))?;
        let hits = nearest(&self.table, query_vec, k).await.map_err(store_err)?;
        debug!("Search returned {} hits for k={}", hits.len(), k);
        Ok(hits)
    }
}

impl std::fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexHandle").field("info", &self.info).finish_non_exhaustive()
    }
}

#[async_trait]
impl Retriever for IndexHandle {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> { self.search(query, k).await }
}
