//! DOCX text extraction.
//!
//! A DOCX file is a zip container; the body lives in `word/document.xml` as
//! WordprocessingML. Resumes lean heavily on tables for two-column layouts,
//! so table-cell text is collected alongside ordinary paragraphs.
//!
//! Output layout: body paragraphs (one per line) first, then one block per
//! table with one cell per line; blocks are separated by a blank line.
//! Merged cells are stored repeatedly in the XML, so identical cell text is
//! kept only once per table.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};

const DOCUMENT_PART: &str = "word/document.xml";

/// Extract plain text from DOCX bytes.
///
/// Returns a human-readable description of the failure when the container
/// or its XML is malformed.
pub fn extract_docx_text(content: &[u8]) -> Result<String, String> {
    let xml = read_document_xml(content)?;
    let body = collect_text(&xml)?;
    Ok(body.render())
}

fn read_document_xml(content: &[u8]) -> Result<String, String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(content)).map_err(|e| format!("invalid container: {e}"))?;
    let mut part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| format!("missing {DOCUMENT_PART}: {e}"))?;
    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .map_err(|e| format!("unreadable {DOCUMENT_PART}: {e}"))?;
    Ok(xml)
}

#[derive(Debug, Default)]
struct DocxText {
    paragraphs: Vec<String>,
    tables: Vec<Vec<String>>,
}

impl DocxText {
    fn render(&self) -> String {
        let mut sections = Vec::new();
        if !self.paragraphs.is_empty() {
            sections.push(self.paragraphs.join("\n"));
        }
        for cells in &self.tables {
            if !cells.is_empty() {
                sections.push(cells.join("\n"));
            }
        }
        sections.join("\n\n")
    }
}

fn collect_text(xml: &str) -> Result<DocxText, String> {
    let mut reader = Reader::from_str(xml);
    let mut out = DocxText::default();

    // Nested tables feed their outermost parent.
    let mut table_depth = 0usize;
    let mut table: Vec<String> = Vec::new();
    let mut cells: Vec<Vec<String>> = Vec::new();
    // Text boxes nest whole paragraphs inside a run of the enclosing one.
    let mut paragraphs: Vec<String> = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:tbl" => table_depth += 1,
                b"w:tc" => cells.push(Vec::new()),
                b"w:p" => paragraphs.push(String::new()),
                b"w:t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                let Some(paragraph) = paragraphs.last_mut() else { continue };
                match e.name().as_ref() {
                    b"w:tab" => paragraph.push('\t'),
                    b"w:br" | b"w:cr" => paragraph.push('\n'),
                    _ => {}
                }
            }
            Ok(Event::Text(e)) if in_text => {
                let text = e.unescape().map_err(|e| format!("bad XML text: {e}"))?;
                if let Some(paragraph) = paragraphs.last_mut() {
                    paragraph.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    let Some(paragraph) = paragraphs.pop() else { continue };
                    let text = paragraph.trim();
                    if !text.is_empty() {
                        match cells.last_mut() {
                            Some(cell) => cell.push(text.to_string()),
                            None => out.paragraphs.push(text.to_string()),
                        }
                    }
                }
                b"w:tc" => {
                    let Some(cell) = cells.pop() else { continue };
                    let text = cell.join("\n");
                    let text = text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    if table_depth > 0 && !table.iter().any(|c| c == text) {
                        table.push(text.to_string());
                    }
                }
                b"w:tbl" => {
                    table_depth = table_depth.saturating_sub(1);
                    if table_depth == 0 {
                        out.tables.push(std::mem::take(&mut table));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "malformed XML at position {}: {e}",
                    reader.buffer_position()
                ))
            }
            _ => {}
        }
    }

    Ok(out)
}
