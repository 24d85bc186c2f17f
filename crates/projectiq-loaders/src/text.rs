use std::path::Path;

use projectiq_core::error::LoaderError;
use projectiq_core::traits::DocumentLoader;
use projectiq_core::types::Document;

use crate::read_bytes;

/// Plain text and markdown, verbatim. Invalid UTF-8 is replaced, not rejected.
pub struct TextLoader;

impl DocumentLoader for TextLoader {
    fn extensions(&self) -> &[&str] { &[".txt", ".md"] }

    fn load(&self, path: &Path) -> Result<Vec<Document>, LoaderError> {
        let bytes = read_bytes(path)?;
        Ok(vec![Document::new(String::from_utf8_lossy(&bytes).into_owned(), path)])
    }
}
