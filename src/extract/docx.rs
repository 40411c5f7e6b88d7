//! DOCX text extraction: unzip `word/document.xml` and walk its runs.

use std::io::{Cursor, Read};

use quick_xml::events::Event;

use super::{DocFormat, EngineOutput, ExtractionEngine};

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb guard).
pub(crate) const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

const DOCUMENT_XML: &str = "word/document.xml";

pub struct DocxEngine;

impl ExtractionEngine for DocxEngine {
    fn name(&self) -> &'static str {
        "docx-xml"
    }

    fn formats(&self) -> &'static [DocFormat] {
        &[DocFormat::Docx]
    }

    fn extract(&self, bytes: &[u8]) -> EngineOutput {
        match docx_text(bytes) {
            Ok(text) => EngineOutput::text(text),
            Err(e) => {
                tracing::warn!(error = %e, "docx extraction failed");
                EngineOutput {
                    note: Some(format!("docx unreadable: {}", e)),
                    ..EngineOutput::default()
                }
            }
        }
    }
}

/// Paragraph text of a DOCX package, one paragraph per line.
fn docx_text(bytes: &[u8]) -> Result<String, String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let xml = read_entry_bounded(&mut archive, DOCUMENT_XML)?;
    paragraphs_from_xml(&xml)
}

fn read_entry_bounded(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Vec<u8>, String> {
    let entry = archive
        .by_name(name)
        .map_err(|_| format!("{} not found", name))?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| e.to_string())?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(format!("{} exceeds size limit", name));
    }
    Ok(out)
}

/// Collect `w:t` text; `w:p` ends a line, `w:tab` and `w:br` map to tab and newline.
fn paragraphs_from_xml(xml: &[u8]) -> Result<String, String> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"tab" => current.push('\t'),
                b"br" | b"cr" => current.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" | b"cr" => current.push('\n'),
                b"p" => paragraphs.push(String::new()),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().map_err(|e| e.to_string())?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    Ok(paragraphs.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_with_body(body: &str) -> Vec<u8> {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        );
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file(DOCUMENT_XML, options).unwrap();
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn paragraphs_become_lines() {
        let bytes = docx_with_body(
            "<w:p><w:r><w:t>Hello </w:t></w:r><w:r><w:t>world</w:t></w:r></w:p>\
             <w:p><w:r><w:t>Second &amp; last</w:t></w:r></w:p>",
        );
        let out = DocxEngine.extract(&bytes);
        assert_eq!(out.text, "Hello world\nSecond & last");
    }

    #[test]
    fn tabs_and_breaks() {
        let bytes = docx_with_body(
            "<w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c</w:t></w:r></w:p>",
        );
        assert_eq!(DocxEngine.extract(&bytes).text, "a\tb\nc");
    }

    #[test]
    fn image_only_docx_has_no_text() {
        let bytes = docx_with_body("<w:p><w:r><w:drawing/></w:r></w:p>");
        let out = DocxEngine.extract(&bytes);
        assert!(out.text.trim().is_empty());
    }

    #[test]
    fn not_a_zip_is_absorbed() {
        let out = DocxEngine.extract(b"definitely not a zip");
        assert!(out.text.is_empty());
        assert!(out.note.unwrap().starts_with("docx unreadable"));
    }

    #[test]
    fn zip_without_document_xml() {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut cursor);
            zip.start_file("other.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"<x/>").unwrap();
            zip.finish().unwrap();
        }
        let out = DocxEngine.extract(&cursor.into_inner());
        assert!(out.text.is_empty());
        assert!(out.note.unwrap().contains("word/document.xml not found"));
    }
}
