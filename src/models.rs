//! Core data models that flow through the ingestion and retrieval pipeline.
//!
//! A document never reaches the index as a whole: it is extracted
//! ([`ExtractionMeta`]), split into chunk strings, and each chunk becomes a
//! [`StoredRecord`] carrying [`Metadata`] with the source `filename` and its
//! `ordinal` within the document.

use serde::Serialize;
use serde_json::Value;

/// Free-form metadata attached to a stored chunk.
pub type Metadata = serde_json::Map<String, Value>;

/// Metadata key holding the source filename.
pub const META_FILENAME: &str = "filename";
/// Metadata key holding the chunk ordinal within its document.
pub const META_ORDINAL: &str = "ordinal";

/// Build the `{filename, ordinal}` metadata the pipeline attaches to each chunk.
pub fn chunk_metadata(filename: &str, ordinal: usize) -> Metadata {
    let mut meta = Metadata::new();
    meta.insert(META_FILENAME.to_string(), Value::from(filename));
    meta.insert(META_ORDINAL.to_string(), Value::from(ordinal as u64));
    meta
}

/// Source filename recorded in chunk metadata, if any.
pub fn filename_of(meta: &Metadata) -> Option<&str> {
    meta.get(META_FILENAME).and_then(Value::as_str)
}

/// Chunk ordinal recorded in metadata; records without one sort first.
pub fn ordinal_of(meta: &Metadata) -> i64 {
    meta.get(META_ORDINAL).and_then(Value::as_i64).unwrap_or(0)
}

/// A chunk plus its embedding, as persisted inside a collection.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub embedding: Vec<f32>,
}

/// A stored chunk without its vector, as returned by full scans.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChunkEntry {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

/// One similarity match. Lower distance means more similar.
#[derive(Debug, Clone, Serialize)]
pub struct QueryHit {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub distance: f32,
}

/// Result of a similarity query, ordered by ascending distance.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub collection: String,
    pub hits: Vec<QueryHit>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// What the extractor did with a file.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ExtractionMeta {
    /// Resolved extension, lowercase with a leading dot (`".pdf"`), or empty.
    pub ext: String,
    /// Engine that produced the text (or the last one tried).
    pub engine: String,
    /// Human-readable note, empty when there is nothing to report.
    pub note: String,
    /// Page count, PDF only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<usize>,
    /// Text encoding chosen by the decoder, byte-oriented formats only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    /// True when a page had images but no selectable text.
    pub likely_scanned: bool,
    /// Characters in the extracted text.
    pub chars: usize,
}

/// Outcome of ingesting one uploaded file.
///
/// Zero chunks is a valid outcome: `diagnostic` then explains why.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_as: Option<String>,
    pub bytes: u64,
    pub collection: String,
    pub extraction: ExtractionMeta,
    pub chars_extracted: usize,
    pub chunks: usize,
    pub preview: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl IngestionReport {
    pub fn indexed(&self) -> bool {
        self.chunks > 0
    }
}
