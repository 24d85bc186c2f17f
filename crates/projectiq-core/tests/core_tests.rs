use std::fs;
use tempfile::TempDir;

use projectiq_core::chunker::Chunker;
use projectiq_core::error::ScanError;
use projectiq_core::scanner::{all_files, FileScanner};
use projectiq_core::types::Document;

fn touch(path: &std::path::Path) {
    if let Some(parent) = path.parent() { fs::create_dir_all(parent).unwrap(); }
    fs::write(path, b"x").unwrap();
}

#[test]
fn scan_groups_only_present_extensions() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    touch(&dir.join("b.docx"));
    touch(&dir.join("nested/deeper/a.docx"));
    touch(&dir.join("nested/sheet.XLSX"));
    touch(&dir.join("notes.txt"));

    let index = FileScanner::default().scan(dir).expect("scan");

    assert_eq!(index.keys().cloned().collect::<Vec<_>>(), vec![".docx".to_string(), ".xlsx".to_string()]);
    assert_eq!(index[".docx"].len(), 2);
    assert!(!index.contains_key(".pdf"), "extensions without matches are absent");
    for path in all_files(&index) {
        assert!(path.is_absolute(), "{} should be absolute", path.display());
    }
    let docx = &index[".docx"];
    let mut sorted = docx.clone();
    sorted.sort();
    assert_eq!(docx, &sorted);
}

#[test]
fn scan_with_no_matches_is_empty() {
    let tmp = TempDir::new().unwrap();
    touch(&tmp.path().join("readme.md"));
    let index = FileScanner::default().scan(tmp.path()).expect("scan");
    assert!(index.is_empty());
}

#[test]
fn scan_missing_root_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("missing");
    assert!(matches!(FileScanner::default().scan(&missing), Err(ScanError::NotFound(_))));
}

#[test]
fn scan_file_root_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("a.pdf");
    touch(&file);
    assert!(matches!(FileScanner::default().scan(&file), Err(ScanError::NotADirectory(_))));
}

#[test]
fn scanned_text_flows_into_chunks() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("a.txt");
    fs::write(&path, "Short text\n").unwrap();

    let index = FileScanner::new(["txt"]).scan(tmp.path()).expect("scan");
    let docs: Vec<Document> = all_files(&index)
        .iter()
        .map(|p| Document::new(fs::read_to_string(p).unwrap(), p))
        .collect();
    let chunks = Chunker::default().split_documents(&docs);

    assert_eq!(chunks.len(), 1, "one small paragraph becomes one chunk");
    assert_eq!(chunks[0].content, "Short text");
    assert!(chunks[0].source().ends_with("a.txt"));
}
