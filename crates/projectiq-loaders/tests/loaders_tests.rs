use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use projectiq_core::error::LoaderError;
use projectiq_core::scanner::FileScanner;
use projectiq_core::traits::DocumentLoader;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, Stream};

use projectiq_loaders::{EmailLoader, ExcelLoader, LoaderRegistry, PdfLoader, WordLoader};

fn write_zip(path: &Path, parts: &[(&str, String)]) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    let options = SimpleFileOptions::default();
    for (name, body) in parts {
        zip.start_file(*name, options).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

fn para(text: &str) -> String { format!("<w:p><w:r><w:t>{text}</w:t></w:r></w:p>") }

fn write_docx(path: &Path, body: &str) {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}<w:sectPr/></w:body></w:document>"#
    );
    let content_types = r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;
    write_zip(path, &[("[Content_Types].xml", content_types.to_string()), ("word/document.xml", document)]);
}

fn inline_cell(cell_ref: &str, text: &str) -> String { format!(r#"<c r="{cell_ref}" t="inlineStr"><is><t>{text}</t></is></c>"#) }

fn write_xlsx(path: &Path, sheets: &[(&str, Vec<String>)]) {
    const NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
    const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
    let mut parts = Vec::new();
    let mut sheet_entries = String::new();
    let mut rels = String::new();
    let mut overrides = String::new();
    for (i, (name, rows)) in sheets.iter().enumerate() {
        let n = i + 1;
        sheet_entries.push_str(&format!(r#"<sheet name="{name}" sheetId="{n}" r:id="rId{n}"/>"#));
        rels.push_str(&format!(r#"<Relationship Id="rId{n}" Type="{REL_NS}/worksheet" Target="worksheets/sheet{n}.xml"/>"#));
        overrides.push_str(&format!(r#"<Override PartName="/xl/worksheets/sheet{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#));
        let sheet_rows: String = rows.iter().enumerate().map(|(r, cells)| format!(r#"<row r="{}">{cells}</row>"#, r + 1)).collect();
        parts.push((format!("xl/worksheets/sheet{n}.xml"), format!(r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="{NS}"><sheetData>{sheet_rows}</sheetData></worksheet>"#)));
    }
    let content_types = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>{overrides}</Types>"#
    );
    let root_rels = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{REL_NS}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
    );
    let workbook = format!(r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="{NS}" xmlns:r="{REL_NS}"><sheets>{sheet_entries}</sheets></workbook>"#);
    let workbook_rels = format!(r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels}</Relationships>"#);

    let mut all: Vec<(&str, String)> = vec![
        ("[Content_Types].xml", content_types),
        ("_rels/.rels", root_rels),
        ("xl/workbook.xml", workbook),
        ("xl/_rels/workbook.xml.rels", workbook_rels),
    ];
    all.extend(parts.iter().map(|(name, body)| (name.as_str(), body.clone())));
    write_zip(path, &all);
}

fn write_eml(path: &Path, body: &str) {
    let raw = format!(
        "From: Site Manager <manager@example.com>\r\nTo: team@example.com\r\nSubject: Pour schedule\r\nDate: Mon, 6 May 2024 09:30:00 +0000\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{body}"
    );
    fs::write(path, raw).unwrap();
}

#[test]
fn word_two_paragraphs_and_one_table_yield_two_documents() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("plan.docx");
    let table = "<w:tbl><w:tr><w:tc><w:p><w:r><w:t>Phase</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Weeks</w:t></w:r></w:p></w:tc></w:tr><w:tr><w:tc><w:p><w:r><w:t>Foundations</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>6</w:t></w:r></w:p></w:tc></w:tr></w:tbl>";
    write_docx(&path, &format!("{}{}{}", para("Project kickoff in March."), table, para("Budget approved.")));

    let docs = WordLoader.load(&path).expect("load docx");

    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].content, "Project kickoff in March.\nBudget approved.");
    assert_eq!(docs[0].source(), path.to_string_lossy());
    assert_eq!(docs[1].content, "|Phase|Weeks|\n|Foundations|6|");
    assert_eq!(docs[1].metadata.get("table").map(String::as_str), Some("1"));
}

#[test]
fn word_without_paragraphs_still_emits_body_document() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("empty.docx");
    write_docx(&path, "<w:p/>");
    let docs = WordLoader.load(&path).expect("load docx");
    assert_eq!(docs.len(), 1);
    assert!(docs[0].content.is_empty());
}

#[test]
fn word_that_is_not_a_zip_is_a_parse_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("fake.docx");
    fs::write(&path, "plain text pretending").unwrap();
    assert!(matches!(WordLoader.load(&path), Err(LoaderError::Parse { .. })));
}

#[test]
fn workbook_with_two_sheets_yields_two_documents() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("costs.xlsx");
    write_xlsx(
        &path,
        &[
            ("Budget", vec![
                format!("{}{}", inline_cell("A1", "Item"), inline_cell("B1", "Qty")),
                format!(r#"{}<c r="B2"><v>40</v></c>"#, inline_cell("A2", "Rebar")),
                format!(r#"{}<c r="B3"><v>12.5</v></c>"#, inline_cell("A3", "Cement")),
            ]),
            ("Schedule", vec![
                format!("{}{}", inline_cell("A1", "Task"), inline_cell("B1", "Owner")),
                inline_cell("A2", "Survey"),
            ]),
        ],
    );

    let docs = ExcelLoader.load(&path).expect("load xlsx");

    assert_eq!(docs.len(), 2);
    let sheets: Vec<_> = docs.iter().map(|d| d.metadata.get("sheet").cloned().unwrap_or_default()).collect();
    assert_eq!(sheets, vec!["Budget".to_string(), "Schedule".to_string()]);
    assert_eq!(docs[0].content, "Item: Rebar | Qty: 40\nItem: Cement | Qty: 12.5");
    assert_eq!(docs[1].content, "Task: Survey | Owner: nan");
}

/// One page per entry; `None` leaves the page without any text.
fn write_pdf(path: &Path, pages: &[Option<&str>]) {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! { "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Courier" });
    let resources_id = doc.add_object(dictionary! { "Font" => dictionary! { "F1" => font_id } });
    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let operations = match text {
            Some(text) => vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
            None => Vec::new(),
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, Content { operations }.encode().unwrap()));
        let page_id = doc.add_object(dictionary! { "Type" => "Page", "Parent" => pages_id, "Contents" => content_id });
        kids.push(page_id.into());
    }
    let count = i64::try_from(kids.len()).unwrap();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

#[test]
fn pdf_yields_one_document_per_page_with_text() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("minutes.pdf");
    write_pdf(&path, &[Some("Pour scheduled Monday"), None, Some("Crane hire approved")]);

    let docs = PdfLoader.load(&path).expect("load pdf");

    assert_eq!(docs.len(), 2);
    let pages: Vec<_> = docs.iter().map(|d| d.metadata.get("page").cloned().unwrap_or_default()).collect();
    assert_eq!(pages, vec!["1".to_string(), "3".to_string()]);
    assert!(docs[0].content.contains("Pour scheduled Monday"));
    assert!(docs[1].content.contains("Crane hire approved"));
    assert!(docs.iter().all(|d| d.source() == path.to_string_lossy()));
}

#[test]
fn email_body_of_five_chars_is_dropped() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("short.eml");
    write_eml(&path, "Hello");
    assert!(EmailLoader.load(&path).expect("load eml").is_empty());
}

#[test]
fn email_body_of_six_chars_is_kept_with_headers() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("long.eml");
    write_eml(&path, "Hello!");

    let docs = EmailLoader.load(&path).expect("load eml");

    assert_eq!(docs.len(), 1);
    let meta = &docs[0].metadata;
    assert_eq!(docs[0].content, "Hello!");
    assert_eq!(meta.get("subject").map(String::as_str), Some("Pour schedule"));
    assert_eq!(meta.get("sender").map(String::as_str), Some("Site Manager <manager@example.com>"));
    assert!(meta.get("date").is_some_and(|d| d.starts_with("2024-05-06T09:30:00")));
    assert!(meta.contains_key("source"));
}

#[test]
fn registry_skips_failing_files_and_keeps_going() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write_docx(&root.join("good.docx"), &para("Scope of works"));
    fs::write(root.join("broken.docx"), "not a zip").unwrap();
    fs::write(root.join("notes.txt"), "Crane arrives Tuesday").unwrap();

    let index = FileScanner::new([".docx", ".txt"]).scan(root).expect("scan");
    let report = LoaderRegistry::with_defaults().load_index(&index);

    assert_eq!(report.files_loaded, 2);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].0.ends_with("broken.docx"));
    let contents: Vec<_> = report.documents.iter().map(|d| d.content.as_str()).collect();
    assert_eq!(contents, vec!["Scope of works", "Crane arrives Tuesday"]);
}

#[test]
fn registry_dispatch_is_case_insensitive_and_rejects_unknown() {
    let registry = LoaderRegistry::with_defaults();
    assert!(registry.supports("DOCX"));
    assert!(registry.supports(".eml"));
    assert!(!registry.supports(".pptx"));
    let err = registry.load_file(Path::new("/tmp/deck.pptx")).unwrap_err();
    assert!(matches!(err, LoaderError::Unsupported { .. }));
}
