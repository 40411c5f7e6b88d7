//! PDF engines.
//!
//! `lopdf` is the primary engine: it walks the page tree, extracts text page by
//! page and flags pages that carry images but no selectable text (the usual
//! shape of a scanned document). `pdf-extract` is the fallback for files whose
//! content streams lopdf cannot decode.

use lopdf::Document;

use super::{DocFormat, EngineOutput, ExtractionEngine};

pub struct LopdfEngine;

impl ExtractionEngine for LopdfEngine {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn formats(&self) -> &'static [DocFormat] {
        &[DocFormat::Pdf]
    }

    fn extract(&self, bytes: &[u8]) -> EngineOutput {
        let doc = match Document::load_mem(bytes) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(error = %e, "lopdf could not load pdf");
                return EngineOutput {
                    note: Some(format!("pdf unreadable: {}", e)),
                    ..EngineOutput::default()
                };
            }
        };

        let pages = doc.get_pages();
        let mut page_texts = Vec::with_capacity(pages.len());
        let mut image_only_pages = 0usize;

        for (&page_num, &page_id) in &pages {
            let text = match doc.extract_text(&[page_num]) {
                Ok(text) => text,
                Err(e) => {
                    tracing::debug!(page = page_num, error = %e, "no text on page");
                    String::new()
                }
            };
            if text.trim().is_empty() {
                let has_images = doc
                    .get_page_images(page_id)
                    .map(|images| !images.is_empty())
                    .unwrap_or(false);
                if has_images {
                    image_only_pages += 1;
                }
            } else {
                page_texts.push(text.trim().to_string());
            }
        }

        let text = page_texts.join("\n\n");
        // Mixed documents keep their text; the note says which part was lost.
        let note = (image_only_pages > 0 && !text.is_empty()).then(|| {
            format!(
                "{} of {} pages likely scanned (no selectable text)",
                image_only_pages,
                pages.len()
            )
        });
        EngineOutput {
            likely_scanned: image_only_pages > 0,
            pages: Some(pages.len()),
            text,
            note,
            ..EngineOutput::default()
        }
    }
}

pub struct PdfExtractEngine;

impl ExtractionEngine for PdfExtractEngine {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn formats(&self) -> &'static [DocFormat] {
        &[DocFormat::Pdf]
    }

    fn extract(&self, bytes: &[u8]) -> EngineOutput {
        match pdf_extract::extract_text_from_mem(bytes) {
            Ok(text) => EngineOutput::text(text),
            Err(e) => {
                tracing::warn!(error = %e, "pdf-extract failed");
                EngineOutput {
                    note: Some(format!("pdf unreadable: {}", e)),
                    ..EngineOutput::default()
                }
            }
        }
    }
}
