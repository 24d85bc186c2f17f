//! PDF loader: one document per page with extractable text.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use tracing::debug;

use projectiq_core::error::LoaderError;
use projectiq_core::traits::DocumentLoader;
use projectiq_core::types::{Document, META_PAGE};

use crate::read_bytes;

pub struct PdfLoader;

impl DocumentLoader for PdfLoader {
    fn extensions(&self) -> &[&str] { &[".pdf"] }

    fn load(&self, path: &Path) -> Result<Vec<Document>, LoaderError> {
        let bytes = read_bytes(path)?;
        let pages = extract_pages(&bytes).map_err(|e| LoaderError::parse(path, e))?;
        debug!("{}: {} pages", path.display(), pages.len());
        Ok(pages
            .into_iter()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(i, text)| Document::new(text, path).with_meta(META_PAGE, (i + 1).to_string()))
            .collect())
    }
}

/// The extractor panics on some malformed or encrypted inputs; treat that as a parse failure.
fn extract_pages(bytes: &[u8]) -> Result<Vec<String>, String> {
    match panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem_by_pages(bytes))) {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("PDF extractor panicked".to_string()),
    }
}
