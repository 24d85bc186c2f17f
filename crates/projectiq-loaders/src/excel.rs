//! Spreadsheet loader: one document per sheet, one `col: value` line per row.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};

use projectiq_core::error::LoaderError;
use projectiq_core::traits::DocumentLoader;
use projectiq_core::types::{Document, META_SHEET};

use crate::read_bytes;

const MISSING: &str = "nan";

pub struct ExcelLoader;

impl DocumentLoader for ExcelLoader {
    fn extensions(&self) -> &[&str] { &[".xlsx", ".xlsm", ".xls", ".ods"] }

    fn load(&self, path: &Path) -> Result<Vec<Document>, LoaderError> {
        let bytes = read_bytes(path)?;
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| LoaderError::parse(path, e))?;
        let mut docs = Vec::new();
        for sheet in workbook.sheet_names() {
            let range = workbook.worksheet_range(&sheet).map_err(|e| LoaderError::parse(path, format!("sheet '{sheet}': {e}")))?;
            docs.push(Document::new(render_sheet(&range), path).with_meta(META_SHEET, sheet));
        }
        Ok(docs)
    }
}

fn render_sheet(range: &Range<Data>) -> String {
    let mut rows = range.rows();
    let Some(first) = rows.next() else { return String::new() };
    let header = header_names(first);
    rows.map(|row| {
        header
            .iter()
            .enumerate()
            .map(|(i, name)| format!("{name}: {}", row.get(i).map_or_else(|| MISSING.to_string(), render_cell)))
            .collect::<Vec<_>>()
            .join(" | ")
    })
    .collect::<Vec<_>>()
    .join("\n")
}

/// Blank headers become `Unnamed: <index>`; repeats get a `.N` suffix.
fn header_names(row: &[Data]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    row.iter()
        .enumerate()
        .map(|(i, cell)| {
            let name = match cell {
                Data::Empty => format!("Unnamed: {i}"),
                other => render_cell(other),
            };
            let count = seen.entry(name.clone()).or_insert(0);
            let unique = if *count == 0 { name } else { format!("{name}.{count}") };
            *count += 1;
            unique
        })
        .collect()
}

fn render_cell(cell: &Data) -> String {
    match cell {
        Data::Empty => MISSING.to_string(),
        Data::String(s) if s.is_empty() => MISSING.to_string(),
        Data::Bool(b) => if *b { "True".to_string() } else { "False".to_string() },
        Data::DateTime(dt) => dt
            .as_datetime()
            .map_or_else(|| dt.as_f64().to_string(), |d| d.format("%Y-%m-%d %H:%M:%S").to_string()),
        other => other.to_string(),
    }
}
