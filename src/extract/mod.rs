//! Multi-format text extraction with engine fallback.
//!
//! An [`Extractor`] holds an ordered registry of [`ExtractionEngine`]s. For a
//! given file it picks the engines that handle the declared format, runs them
//! in registry order and keeps the first non-empty result. Engines never
//! return errors: malformed input, a parser panic or a missing capability all
//! end up as empty text plus a note in [`ExtractionMeta`]. The only hard
//! failure is being unable to read the file at all.
//!
//! | Format | Extensions | Engines (in order) |
//! |--------|------------|--------------------|
//! | [`DocFormat::Text`] | `.txt`, `.md`, `.markdown` | `plain` |
//! | [`DocFormat::Csv`] | `.csv` | `csv` |
//! | [`DocFormat::Spreadsheet`] | `.xlsx`, `.xlsm`, `.xls` | `calamine` |
//! | [`DocFormat::Docx`] | `.docx` | `docx-xml` |
//! | [`DocFormat::Pdf`] | `.pdf` | `lopdf`, then `pdf-extract` |
//! | [`DocFormat::Unknown`] | anything else | `plain` (raw decode) |
//!
//! `calamine` needs the `spreadsheet` feature; the PDF engines need `pdf`.

pub mod decode;
pub mod docx;
#[cfg(feature = "pdf")]
pub mod pdf;
pub mod table;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use serde::Serialize;

use crate::error::{RagError, Result};
use crate::models::ExtractionMeta;

/// Document formats the extractor dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocFormat {
    Text,
    Csv,
    Spreadsheet,
    Docx,
    Pdf,
    Unknown,
}

impl DocFormat {
    /// Map an extension (with or without the leading dot, any case) to a format.
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "txt" | "md" | "markdown" => DocFormat::Text,
            "csv" => DocFormat::Csv,
            "xlsx" | "xlsm" | "xls" => DocFormat::Spreadsheet,
            "docx" => DocFormat::Docx,
            "pdf" => DocFormat::Pdf,
            _ => DocFormat::Unknown,
        }
    }
}

/// Normalize an extension to lowercase with a leading dot; empty stays empty.
pub fn normalize_extension(ext: &str) -> String {
    let bare = ext.trim().trim_start_matches('.').to_ascii_lowercase();
    if bare.is_empty() {
        String::new()
    } else {
        format!(".{}", bare)
    }
}

/// Extension of a file name, normalized with [`normalize_extension`].
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(normalize_extension)
        .unwrap_or_default()
}

/// What a single engine produced.
#[derive(Debug, Clone, Default)]
pub struct EngineOutput {
    pub text: String,
    pub pages: Option<usize>,
    pub likely_scanned: bool,
    pub encoding: Option<String>,
    /// Engine-specific remark (e.g. "csv parsed to text").
    pub note: Option<String>,
}

impl EngineOutput {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn text(text: String) -> Self {
        Self {
            text,
            ..Self::default()
        }
    }

    fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// A format-specific extraction capability.
///
/// Implementations absorb their own failures: log them and return
/// [`EngineOutput::empty`].
pub trait ExtractionEngine: Send + Sync {
    fn name(&self) -> &'static str;
    fn formats(&self) -> &'static [DocFormat];
    fn extract(&self, bytes: &[u8]) -> EngineOutput;
}

/// Plain-text engine: decodes bytes with the [`decode`] chain.
pub struct PlainTextEngine;

impl ExtractionEngine for PlainTextEngine {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn formats(&self) -> &'static [DocFormat] {
        &[DocFormat::Text, DocFormat::Unknown]
    }

    fn extract(&self, bytes: &[u8]) -> EngineOutput {
        let decoded = decode::decode_bytes(bytes);
        EngineOutput {
            text: decoded.text,
            encoding: Some(decoded.encoding.to_string()),
            ..EngineOutput::default()
        }
    }
}

/// One row of [`Extractor::capabilities`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Capability {
    pub engine: &'static str,
    pub formats: Vec<DocFormat>,
    pub available: bool,
}

/// Every engine this crate knows about, and whether it was compiled in.
const KNOWN_ENGINES: &[(&str, &[DocFormat], bool)] = &[
    ("plain", &[DocFormat::Text, DocFormat::Unknown], true),
    ("csv", &[DocFormat::Csv], true),
    (
        "calamine",
        &[DocFormat::Spreadsheet],
        cfg!(feature = "spreadsheet"),
    ),
    ("docx-xml", &[DocFormat::Docx], true),
    ("lopdf", &[DocFormat::Pdf], cfg!(feature = "pdf")),
    ("pdf-extract", &[DocFormat::Pdf], cfg!(feature = "pdf")),
];

/// Ordered registry of extraction engines.
pub struct Extractor {
    engines: Vec<Box<dyn ExtractionEngine>>,
}

impl Extractor {
    /// An extractor with exactly the given engines, tried in the given order.
    pub fn new(engines: Vec<Box<dyn ExtractionEngine>>) -> Self {
        Self { engines }
    }

    /// All engines compiled into this build, in their default order.
    pub fn with_default_engines() -> Self {
        let mut engines: Vec<Box<dyn ExtractionEngine>> = vec![
            Box::new(PlainTextEngine),
            Box::new(table::CsvEngine),
            Box::new(docx::DocxEngine),
        ];
        #[cfg(feature = "spreadsheet")]
        engines.push(Box::new(table::SpreadsheetEngine));
        #[cfg(feature = "pdf")]
        {
            engines.push(Box::new(pdf::LopdfEngine));
            engines.push(Box::new(pdf::PdfExtractEngine));
        }
        Self::new(engines)
    }

    /// Report which engines exist and which are registered here.
    pub fn capabilities(&self) -> Vec<Capability> {
        let mut caps: Vec<Capability> = KNOWN_ENGINES
            .iter()
            .map(|(name, formats, _)| Capability {
                engine: name,
                formats: formats.to_vec(),
                available: self.engines.iter().any(|e| e.name() == *name),
            })
            .collect();
        for engine in &self.engines {
            if !caps.iter().any(|c| c.engine == engine.name()) {
                caps.push(Capability {
                    engine: engine.name(),
                    formats: engine.formats().to_vec(),
                    available: true,
                });
            }
        }
        caps
    }

    /// Whether the build ships an engine, regardless of this registry.
    pub fn compiled_in(engine: &str) -> bool {
        KNOWN_ENGINES
            .iter()
            .any(|(name, _, compiled)| *name == engine && *compiled)
    }

    /// Read `path` and extract its text, dispatching on `declared_ext`.
    ///
    /// When `declared_ext` is `None` the extension of `path` is used.
    /// Only an unreadable file is an error.
    pub fn extract_file(
        &self,
        path: &Path,
        declared_ext: Option<&str>,
    ) -> Result<(String, ExtractionMeta)> {
        let bytes = std::fs::read(path).map_err(|e| RagError::io(path, e))?;
        let ext = match declared_ext {
            Some(ext) => normalize_extension(ext),
            None => extension_of(&path.to_string_lossy()),
        };
        Ok(self.extract_bytes(&bytes, &ext))
    }

    /// Extract text from in-memory bytes. Never fails.
    pub fn extract_bytes(&self, bytes: &[u8], ext: &str) -> (String, ExtractionMeta) {
        let ext = normalize_extension(ext);
        let format = DocFormat::from_extension(&ext);
        let mut meta = ExtractionMeta {
            ext: ext.clone(),
            ..ExtractionMeta::default()
        };

        let candidates: Vec<&dyn ExtractionEngine> = self
            .engines
            .iter()
            .map(|e| e.as_ref())
            .filter(|e| e.formats().contains(&format))
            .collect();

        if candidates.is_empty() {
            meta.engine = "none".to_string();
            meta.note = format!(
                "no extraction engine available for {} files (missing capability)",
                display_ext(&ext)
            );
            tracing::warn!(ext = %ext, "no extraction engine registered for format");
            return (String::new(), meta);
        }

        let mut winner: Option<(usize, EngineOutput)> = None;
        let mut engine_note: Option<String> = None;
        for (idx, engine) in candidates.iter().enumerate() {
            let output = run_isolated(*engine, bytes);
            meta.likely_scanned |= output.likely_scanned;
            if meta.pages.is_none() {
                meta.pages = output.pages;
            }
            if output.has_text() {
                winner = Some((idx, output));
                break;
            }
            if engine_note.is_none() {
                engine_note = output.note;
            }
            tracing::debug!(engine = engine.name(), ext = %ext, "engine produced no text");
        }

        let text = match winner {
            Some((idx, output)) => {
                let engine = candidates[idx].name();
                meta.engine = engine.to_string();
                meta.encoding = output.encoding;
                meta.note = if idx == 0 {
                    output.note.unwrap_or_default()
                } else if meta.likely_scanned {
                    format!("{} likely scanned; text recovered by {} (fallback)", display_ext(&ext), engine)
                } else {
                    format!("parsed by {} (fallback)", engine)
                };
                output.text.trim().to_string()
            }
            None => {
                meta.engine = candidates[0].name().to_string();
                meta.note = if meta.likely_scanned {
                    format!("{} likely scanned (no selectable text)", display_ext(&ext))
                } else {
                    engine_note.unwrap_or_else(|| "no text found".to_string())
                };
                String::new()
            }
        };

        meta.chars = text.chars().count();
        (text, meta)
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::with_default_engines()
    }
}

fn display_ext(ext: &str) -> &str {
    if ext.is_empty() {
        "extensionless"
    } else {
        ext.trim_start_matches('.')
    }
}

/// Run an engine, turning a parser panic into empty output.
fn run_isolated(engine: &dyn ExtractionEngine, bytes: &[u8]) -> EngineOutput {
    match catch_unwind(AssertUnwindSafe(|| engine.extract(bytes))) {
        Ok(output) => output,
        Err(_) => {
            tracing::warn!(engine = engine.name(), "extraction engine panicked");
            EngineOutput::empty()
        }
    }
}
