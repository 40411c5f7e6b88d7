//! Ingestion pipeline orchestration.
//!
//! Coordinates one file's trip into the index: extraction → cleaning →
//! chunking → embedding → storage. Two outcomes are not errors:
//! a document with no extractable text and a document whose text is too short
//! to form a chunk. Both produce an [`IngestionReport`] with zero chunks and a
//! diagnostic. Unreadable input, a missing embedding provider and store
//! failures are returned as [`RagError`]s.

use std::path::Path;
use std::sync::Arc;

use tokio::io::AsyncRead;

use crate::chunk::{chunk_text, clean_text};
use crate::config::ChunkingConfig;
use crate::error::{RagError, Result};
use crate::extract::{extension_of, DocFormat, Extractor};
use crate::models::{chunk_metadata, ExtractionMeta, IngestionReport};
use crate::uploads::{sanitize_filename, stage_upload};
use crate::vectorstore::VectorStore;

/// Characters of extracted text echoed back in a report.
pub const PREVIEW_CHARS: usize = 300;

pub struct IngestionPipeline {
    extractor: Arc<Extractor>,
    store: Arc<VectorStore>,
    chunking: ChunkingConfig,
}

impl IngestionPipeline {
    pub fn new(extractor: Arc<Extractor>, store: Arc<VectorStore>, chunking: ChunkingConfig) -> Self {
        Self {
            extractor,
            store,
            chunking,
        }
    }

    /// Stage an incoming byte stream into `upload_dir`, then ingest it.
    pub async fn ingest_upload<R>(
        &self,
        upload_dir: &Path,
        declared_name: &str,
        reader: R,
        collection: &str,
    ) -> Result<IngestionReport>
    where
        R: AsyncRead + Unpin,
    {
        let staged = stage_upload(upload_dir, declared_name, reader).await?;
        let mut report = self.ingest(&staged.path, &staged.filename, collection).await?;
        report.saved_as = Some(staged.saved_as);
        Ok(report)
    }

    /// Ingest the file at `file_path` under `declared_name` into `collection`.
    ///
    /// The declared name picks the extraction format and becomes the
    /// `filename` metadata of every chunk.
    pub async fn ingest(
        &self,
        file_path: &Path,
        declared_name: &str,
        collection: &str,
    ) -> Result<IngestionReport> {
        let filename = sanitize_filename(declared_name)
            .or_else(|| {
                file_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .ok_or_else(|| RagError::Input("upload has no filename".to_string()))?;

        let size = tokio::fs::metadata(file_path)
            .await
            .map_err(|e| RagError::io(file_path, e))?
            .len();
        if size == 0 {
            return Err(RagError::Input(format!("{} is empty (0 bytes)", filename)));
        }

        let ext = extension_of(&filename);
        let extractor = Arc::clone(&self.extractor);
        let path = file_path.to_path_buf();
        let declared_ext = ext.clone();
        let extracted = tokio::task::spawn_blocking(move || {
            extractor.extract_file(&path, Some(&declared_ext))
        })
        .await
        .map_err(RagError::from)
        .and_then(|r| r);
        let (raw_text, extraction) = match extracted {
            Ok(out) => out,
            Err(e) => {
                tracing::error!(file = %filename, ext = %ext, error = %e, "extraction failed");
                return Err(e);
            }
        };

        let text = clean_text(&raw_text);
        let mut report = IngestionReport {
            filename: filename.clone(),
            saved_as: None,
            bytes: size,
            collection: collection.to_string(),
            chars_extracted: text.chars().count(),
            chunks: 0,
            preview: preview(&text),
            diagnostic: None,
            extraction,
        };

        if text.is_empty() {
            report.diagnostic = Some(empty_text_diagnostic(&report.extraction));
            tracing::info!(
                file = %filename,
                engine = %report.extraction.engine,
                "no extractable text"
            );
            return Ok(report);
        }

        let chunks = chunk_text(&text, &self.chunking);
        if chunks.is_empty() {
            report.diagnostic = Some(format!(
                "extracted {} characters but the content is too sparse to form a chunk (minimum {} characters)",
                report.chars_extracted, self.chunking.min_chunk_chars
            ));
            tracing::info!(file = %filename, chars = report.chars_extracted, "text too sparse to chunk");
            return Ok(report);
        }

        let metadatas = (0..chunks.len())
            .map(|ordinal| chunk_metadata(&filename, ordinal))
            .collect();
        report.chunks = match self.store.add(collection, &chunks, metadatas).await {
            Ok(added) => added,
            Err(e) => {
                tracing::error!(
                    file = %filename,
                    engine = %report.extraction.engine,
                    collection,
                    error = %e,
                    "indexing failed"
                );
                return Err(e);
            }
        };

        tracing::info!(
            file = %filename,
            engine = %report.extraction.engine,
            chunks = report.chunks,
            collection,
            "ingested"
        );
        Ok(report)
    }
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}

/// Explain why a document produced no text.
fn empty_text_diagnostic(meta: &ExtractionMeta) -> String {
    if meta.likely_scanned {
        return "no selectable text: the PDF looks scanned (image-only pages); run OCR before uploading"
            .to_string();
    }
    match DocFormat::from_extension(&meta.ext) {
        _ if meta.engine == "none" => format!("no text extracted: {}", meta.note),
        DocFormat::Pdf => format!("no text extracted from PDF ({})", meta.note),
        DocFormat::Docx => {
            "no text found in DOCX: the document may contain only images or embedded objects"
                .to_string()
        }
        _ if meta.note.is_empty() || meta.note == "no text found" => "no text found".to_string(),
        _ => format!("no text found ({})", meta.note),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingSelection, HashProvider};
    use crate::store::MemoryBackend;
    use tempfile::TempDir;

    fn pipeline() -> (IngestionPipeline, Arc<VectorStore>) {
        let store = Arc::new(VectorStore::new(
            Arc::new(MemoryBackend::new()),
            EmbeddingSelection::with_provider(Arc::new(HashProvider::new(64))),
        ));
        let pipeline = IngestionPipeline::new(
            Arc::new(Extractor::with_default_engines()),
            Arc::clone(&store),
            ChunkingConfig::default(),
        );
        (pipeline, store)
    }

    #[test]
    fn test_preview_truncates_with_ellipsis() {
        assert_eq!(preview("short"), "short");
        let long = "é".repeat(301);
        let p = preview(&long);
        assert_eq!(p.chars().count(), 301);
        assert!(p.ends_with('…'));
        assert_eq!(preview(&"x".repeat(300)).chars().count(), 300);
    }

    #[test]
    fn test_diagnostics_distinguish_causes() {
        let scanned = ExtractionMeta {
            ext: ".pdf".into(),
            likely_scanned: true,
            ..ExtractionMeta::default()
        };
        assert!(empty_text_diagnostic(&scanned).contains("scanned"));

        let docx = ExtractionMeta {
            ext: ".docx".into(),
            engine: "docx-xml".into(),
            ..ExtractionMeta::default()
        };
        assert!(empty_text_diagnostic(&docx).contains("only images"));

        let missing = ExtractionMeta {
            ext: ".xlsx".into(),
            engine: "none".into(),
            note: "no extraction engine available for xlsx files (missing capability)".into(),
            ..ExtractionMeta::default()
        };
        assert!(empty_text_diagnostic(&missing).contains("missing capability"));
    }

    #[tokio::test]
    async fn test_ingest_plain_text() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("upload.bin");
        std::fs::write(&path, "abcd ".repeat(1000)).unwrap();

        let (pipeline, store) = pipeline();
        let report = pipeline.ingest(&path, "notes.txt", "docs").await.unwrap();
        assert_eq!(report.chunks, 5);
        assert_eq!(report.filename, "notes.txt");
        assert_eq!(report.extraction.ext, ".txt");
        assert_eq!(report.extraction.engine, "plain");
        assert!(report.diagnostic.is_none());
        assert!(report.preview.ends_with('…'));

        let recent = store.recent("docs", 10).await.unwrap();
        assert_eq!(recent.len(), 5);
        assert_eq!(crate::models::ordinal_of(&recent[4].metadata), 4);
    }

    #[tokio::test]
    async fn test_zero_byte_file_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.txt");
        std::fs::write(&path, b"").unwrap();
        let (pipeline, _) = pipeline();
        let err = pipeline.ingest(&path, "empty.txt", "docs").await.unwrap_err();
        assert!(matches!(err, RagError::Input(_)));
    }

    #[tokio::test]
    async fn test_whitespace_only_reports_no_text() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("blank.txt");
        std::fs::write(&path, " \n\t\n ").unwrap();
        let (pipeline, _) = pipeline();
        let report = pipeline.ingest(&path, "blank.txt", "docs").await.unwrap();
        assert_eq!(report.chunks, 0);
        assert_eq!(report.diagnostic.as_deref(), Some("no text found"));
    }

    #[tokio::test]
    async fn test_sparse_text_reports_distinct_diagnostic() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tiny.md");
        std::fs::write(&path, "# Hi").unwrap();
        let (pipeline, _) = pipeline();
        let report = pipeline.ingest(&path, "tiny.md", "docs").await.unwrap();
        assert_eq!(report.chunks, 0);
        assert_eq!(report.chars_extracted, 4);
        assert!(report.diagnostic.unwrap().contains("too sparse"));
    }

    #[tokio::test]
    async fn test_missing_file_is_input_error() {
        let (pipeline, _) = pipeline();
        let err = pipeline
            .ingest(Path::new("/no/such/file.txt"), "file.txt", "docs")
            .await
            .unwrap_err();
        assert!(err.is_input());
    }

    #[tokio::test]
    async fn test_ingest_upload_records_saved_name() {
        let tmp = TempDir::new().unwrap();
        let (pipeline, _) = pipeline();
        let body = "Staged uploads are renamed before they are indexed. ".repeat(3);
        let report = pipeline
            .ingest_upload(tmp.path(), "guide.md", body.as_bytes(), "docs")
            .await
            .unwrap();
        assert_eq!(report.chunks, 1);
        assert!(report.saved_as.unwrap().ends_with("_guide.md"));
    }

    #[tokio::test]
    async fn test_no_provider_is_hard_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("doc.txt");
        std::fs::write(&path, "enough text to make at least one chunk for the index").unwrap();
        let store = Arc::new(VectorStore::new(
            Arc::new(MemoryBackend::new()),
            EmbeddingSelection::default(),
        ));
        let pipeline = IngestionPipeline::new(
            Arc::new(Extractor::with_default_engines()),
            store,
            ChunkingConfig::default(),
        );
        let err = pipeline.ingest(&path, "doc.txt", "docs").await.unwrap_err();
        assert!(err.is_configuration());
    }
}
