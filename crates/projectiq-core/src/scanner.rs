//! Recursive document discovery grouped by extension.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::ScanError;
use crate::types::FileIndex;

pub const DEFAULT_EXTENSIONS: [&str; 3] = [".docx", ".pdf", ".xlsx"];

/// Normalize `"DOCX"`, `"docx"` or `".docx"` to `".docx"`.
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') { ext } else { format!(".{ext}") }
}

/// The normalized extension of `path`, if any.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension().and_then(|e| e.to_str()).map(normalize_extension)
}

pub struct FileScanner {
    extensions: Vec<String>,
}

impl Default for FileScanner {
    fn default() -> Self { Self::new(DEFAULT_EXTENSIONS) }
}

impl FileScanner {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut extensions: Vec<String> = extensions.into_iter().map(|e| normalize_extension(e.as_ref())).collect();
        extensions.sort();
        extensions.dedup();
        Self { extensions }
    }

    pub fn extensions(&self) -> &[String] { &self.extensions }

    /// Walk `root` and group recognized files by extension.
    ///
    /// Only extensions with at least one match appear as keys. Paths are
    /// absolute and sorted within each group.
    pub fn scan(&self, root: &Path) -> Result<FileIndex, ScanError> {
        if !root.exists() { return Err(ScanError::NotFound(root.to_path_buf())); }
        if !root.is_dir() { return Err(ScanError::NotADirectory(root.to_path_buf())); }
        let root = root.canonicalize().map_err(|_| ScanError::NotFound(root.to_path_buf()))?;

        let mut index = FileIndex::new();
        for entry in WalkDir::new(&root) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => { warn!("Skipping unreadable entry under {}: {}", root.display(), e); continue; }
            };
            if !entry.file_type().is_file() { continue; }
            let Some(ext) = extension_of(entry.path()) else { continue };
            if !self.extensions.contains(&ext) { continue; }
            index.entry(ext).or_insert_with(Vec::new).push(entry.into_path());
        }
        for paths in index.values_mut() { paths.sort(); }
        debug!("Scanned {}: {} files", root.display(), index.values().map(Vec::len).sum::<usize>());
        Ok(index)
    }
}

/// Flatten a [`FileIndex`] into a single ordered list.
pub fn all_files(index: &FileIndex) -> Vec<PathBuf> {
    index.values().flatten().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_extension_forms() {
        assert_eq!(normalize_extension("DOCX"), ".docx");
        assert_eq!(normalize_extension(".Pdf"), ".pdf");
        assert_eq!(extension_of(Path::new("/a/b/Report.XLSX")).as_deref(), Some(".xlsx"));
        assert_eq!(extension_of(Path::new("/a/b/README")), None);
    }

    #[test]
    fn dedups_configured_extensions() {
        let scanner = FileScanner::new(["pdf", ".PDF", ".docx"]);
        assert_eq!(scanner.extensions(), &[".docx".to_string(), ".pdf".to_string()]);
    }
}
