//! Word (`.docx`) loader.
//!
//! Streams `word/document.xml` out of the OOXML package. Top-level body
//! paragraphs become one document; every top-level table becomes another,
//! rendered one `|cell|cell|` line per row. Merged cells repeat their text in
//! every grid column they cover, so rows keep the width of the grid.

use std::io::{Cursor, Read};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;

use projectiq_core::error::LoaderError;
use projectiq_core::traits::DocumentLoader;
use projectiq_core::types::{Document, META_TABLE};

use crate::read_bytes;

const DOCUMENT_PART: &str = "word/document.xml";

pub struct WordLoader;

impl DocumentLoader for WordLoader {
    fn extensions(&self) -> &[&str] { &[".docx"] }

    fn load(&self, path: &Path) -> Result<Vec<Document>, LoaderError> {
        let bytes = read_bytes(path)?;
        let xml = read_document_part(&bytes).map_err(|e| LoaderError::parse(path, e))?;
        let body = parse_body(&xml).map_err(|e| LoaderError::parse(path, e))?;

        let mut docs = Vec::with_capacity(1 + body.tables.len());
        docs.push(Document::new(body.paragraphs.join("\n"), path));
        for (i, table) in body.tables.iter().enumerate() {
            docs.push(Document::new(render_table(table), path).with_meta(META_TABLE, (i + 1).to_string()));
        }
        Ok(docs)
    }
}

fn read_document_part(bytes: &[u8]) -> anyhow::Result<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut part = archive.by_name(DOCUMENT_PART)?;
    let mut xml = String::new();
    part.read_to_string(&mut xml)?;
    Ok(xml)
}

type Table = Vec<Vec<String>>;

#[derive(Debug, Default)]
struct Body {
    /// Trimmed, non-empty top-level paragraphs.
    paragraphs: Vec<String>,
    tables: Vec<Table>,
}

enum Owner {
    Body,
    Cell,
}

struct OpenParagraph {
    depth: usize,
    owner: Owner,
    text: String,
}

struct OpenTable {
    depth: usize,
    rows: Table,
    row: Option<Vec<String>>,
    cell: Option<Vec<String>>,
    /// `w:gridSpan` of the open cell.
    span: usize,
    /// The open cell continues a vertical merge from the row above.
    continues: bool,
    /// Last text seen in each grid column, for vertical merges.
    above: Vec<String>,
}

impl OpenTable {
    fn new(depth: usize) -> Self {
        Self { depth, rows: Vec::new(), row: None, cell: None, span: 1, continues: false, above: Vec::new() }
    }

    fn in_cell_properties(&self, stack_len: usize) -> bool { self.cell.is_some() && self.depth + 3 == stack_len }

    fn close_cell(&mut self) {
        let (Some(cell), Some(row)) = (self.cell.take(), self.row.as_mut()) else { return };
        let col = row.len();
        let text = if self.continues {
            self.above.get(col).cloned().unwrap_or_default()
        } else {
            cell.join("\n").trim().to_string()
        };
        for i in col..col + self.span {
            row.push(text.clone());
            if self.above.len() <= i { self.above.resize(i + 1, String::new()); }
            self.above[i].clone_from(&text);
        }
    }
}

fn attr_val(e: &BytesStart<'_>) -> Option<String> {
    e.attributes().flatten().find(|a| a.key.local_name().as_ref() == b"val").map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn parse_body(xml: &str) -> anyhow::Result<Body> {
    let mut reader = Reader::from_str(xml);
    let mut body = Body::default();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut para: Option<OpenParagraph> = None;
    let mut table: Option<OpenTable> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                let parent = stack.last().map(Vec::as_slice);
                let depth = stack.len() + 1;
                match name.as_slice() {
                    b"tbl" if parent == Some(b"body".as_slice()) && table.is_none() => {
                        table = Some(OpenTable::new(depth));
                    }
                    b"tr" => {
                        if let Some(t) = table.as_mut().filter(|t| t.depth + 1 == depth) { t.row = Some(Vec::new()); }
                    }
                    b"tc" => {
                        if let Some(t) = table.as_mut().filter(|t| t.depth + 2 == depth) {
                            t.cell = Some(Vec::new());
                            t.span = 1;
                            t.continues = false;
                        }
                    }
                    b"p" if para.is_none() => {
                        if parent == Some(b"body".as_slice()) {
                            para = Some(OpenParagraph { depth, owner: Owner::Body, text: String::new() });
                        } else if table.as_ref().is_some_and(|t| t.depth + 3 == depth && t.cell.is_some()) {
                            para = Some(OpenParagraph { depth, owner: Owner::Cell, text: String::new() });
                        }
                    }
                    _ => {}
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"tab" => { if let Some(p) = para.as_mut() { p.text.push('\t'); } }
                    b"br" | b"cr" => { if let Some(p) = para.as_mut() { p.text.push('\n'); } }
                    b"gridSpan" => {
                        if let Some(t) = table.as_mut().filter(|t| t.in_cell_properties(stack.len())) {
                            t.span = attr_val(&e).and_then(|v| v.parse().ok()).filter(|n| *n > 0).unwrap_or(1);
                        }
                    }
                    b"vMerge" => {
                        if let Some(t) = table.as_mut().filter(|t| t.in_cell_properties(stack.len())) {
                            t.continues = attr_val(&e).is_none_or(|v| v == "continue");
                        }
                    }
                    b"p" => {
                        // Self-closing paragraphs are empty lines inside a cell.
                        if let Some(cell) = table.as_mut().filter(|t| t.depth + 3 == stack.len() + 1).and_then(|t| t.cell.as_mut()) {
                            cell.push(String::new());
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(e) => {
                if let Some(p) = para.as_mut().filter(|_| stack.last().is_some_and(|n| n == b"t")) {
                    p.text.push_str(&e.unescape()?);
                }
            }
            Event::End(_) => {
                let depth = stack.len();
                let name = stack.pop().unwrap_or_default();
                match name.as_slice() {
                    b"p" if para.as_ref().is_some_and(|p| p.depth == depth) => {
                        if let Some(p) = para.take() {
                            match p.owner {
                                Owner::Body => {
                                    let text = p.text.trim();
                                    if !text.is_empty() { body.paragraphs.push(text.to_string()); }
                                }
                                Owner::Cell => {
                                    if let Some(cell) = table.as_mut().and_then(|t| t.cell.as_mut()) { cell.push(p.text); }
                                }
                            }
                        }
                    }
                    b"tc" => {
                        if let Some(t) = table.as_mut().filter(|t| t.depth + 2 == depth) { t.close_cell(); }
                    }
                    b"tr" => {
                        if let Some(t) = table.as_mut().filter(|t| t.depth + 1 == depth) {
                            if let Some(row) = t.row.take() { t.rows.push(row); }
                        }
                    }
                    b"tbl" if table.as_ref().is_some_and(|t| t.depth == depth) => {
                        if let Some(t) = table.take() { body.tables.push(t.rows); }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(body)
}

fn render_table(table: &Table) -> String {
    table.iter().map(|row| format!("|{}|", row.join("|"))).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:r><w:t xml:space="preserve">  Site survey </w:t></w:r><w:r><w:t>notes</w:t></w:r></w:p>
<w:p/>
<w:p><w:r><w:t>   </w:t></w:r></w:p>
<w:tbl><w:tr><w:tc><w:p><w:r><w:t>Item</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t> Qty </w:t></w:r></w:p></w:tc></w:tr>
<w:tr><w:tc><w:p><w:r><w:t>Rebar</w:t></w:r></w:p><w:p><w:r><w:t>12mm</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>40</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
<w:p><w:r><w:t>Tom &amp; Jerry</w:t><w:tab/><w:t>Ltd</w:t></w:r></w:p>
</w:body></w:document>"#;

    #[test]
    fn parses_paragraphs_and_tables() {
        let body = parse_body(XML).expect("parse");
        assert_eq!(body.paragraphs, vec!["Site survey notes".to_string(), "Tom & Jerry\tLtd".to_string()]);
        assert_eq!(body.tables.len(), 1);
        assert_eq!(render_table(&body.tables[0]), "|Item|Qty|\n|Rebar\n12mm|40|");
    }

    #[test]
    fn merged_cells_repeat_across_the_grid() {
        let cell = |props: &str, text: &str| format!("<w:tc><w:tcPr>{props}</w:tcPr><w:p><w:r><w:t>{text}</w:t></w:r></w:p></w:tc>");
        let xml = format!(
            r#"<w:document xmlns:w="urn:w"><w:body><w:tbl><w:tr>{}{}{}</w:tr><w:tr>{}{}</w:tr><w:tr>{}{}{}</w:tr></w:tbl></w:body></w:document>"#,
            cell(r#"<w:vMerge w:val="restart"/>"#, "Zone"),
            cell("", "Item"),
            cell("", "Cost"),
            cell("<w:vMerge/>", ""),
            cell(r#"<w:gridSpan w:val="2"/>"#, "Total"),
            cell("", "B"),
            cell("", "Steel"),
            cell("", "40"),
        );
        let body = parse_body(&xml).expect("parse");
        assert_eq!(render_table(&body.tables[0]), "|Zone|Item|Cost|\n|Zone|Total|Total|\n|B|Steel|40|");
    }

    #[test]
    fn rejects_malformed_xml() {
        assert!(parse_body("<w:document><w:body><w:p></w:body>").is_err());
    }
}
