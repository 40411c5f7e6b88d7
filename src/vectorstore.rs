//! Collection-scoped vector store: add, similarity query, and recent-document retrieval.
//!
//! The store owns the process-wide embedding provider and the index backend.
//! Collections are created on first reference and remembered for the life of
//! the store, together with the embedding model and dimensionality they were
//! created with. A collection never mixes vectors from different models: any
//! add or query through a provider that does not match fails with
//! [`RagError::Configuration`].
//!
//! # Recency
//!
//! [`VectorStore::recent`] does not look at timestamps. It scans the
//! collection in append order, takes the last non-empty `filename`, and
//! returns that document's chunks sorted by `ordinal`. Backends make append
//! order explicit (SQLite: an autoincrement `seq` column).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::embedding::{embed_query, EmbeddingProvider, EmbeddingSelection};
use crate::error::{RagError, Result};
use crate::models::{filename_of, ordinal_of, ChunkEntry, Metadata, QueryResult, StoredRecord};
use crate::store::{CollectionInfo, IndexBackend};

pub struct VectorStore {
    backend: Arc<dyn IndexBackend>,
    embeddings: EmbeddingSelection,
    collections: Mutex<HashMap<String, Arc<CollectionInfo>>>,
}

impl VectorStore {
    pub fn new(backend: Arc<dyn IndexBackend>, embeddings: EmbeddingSelection) -> Self {
        Self {
            backend,
            embeddings,
            collections: Mutex::new(HashMap::new()),
        }
    }

    pub fn backend(&self) -> &dyn IndexBackend {
        self.backend.as_ref()
    }

    pub fn embeddings(&self) -> &EmbeddingSelection {
        &self.embeddings
    }

    /// Resolve a collection, creating it on first reference.
    ///
    /// The cache lock is held across creation so two concurrent first calls
    /// cannot both initialize the same name.
    async fn collection(
        &self,
        name: &str,
        provider: &dyn EmbeddingProvider,
    ) -> Result<Arc<CollectionInfo>> {
        let mut cache = self.collections.lock().await;
        let info = match cache.get(name) {
            Some(info) => Arc::clone(info),
            None => {
                let info = Arc::new(
                    self.backend
                        .create_or_get(name, provider.model_name(), provider.dims())
                        .await?,
                );
                tracing::debug!(
                    collection = name,
                    model = %info.embedding_model,
                    dims = info.dims,
                    "collection opened"
                );
                cache.insert(name.to_string(), Arc::clone(&info));
                info
            }
        };
        drop(cache);

        if info.embedding_model != provider.model_name() || info.dims != provider.dims() {
            return Err(RagError::Configuration(format!(
                "collection '{}' was built with {} ({} dims) but the active embedding model is {} ({} dims)",
                name,
                info.embedding_model,
                info.dims,
                provider.model_name(),
                provider.dims()
            )));
        }
        Ok(info)
    }

    /// Embed and persist `chunks` into `collection`. Returns the number added.
    ///
    /// `metadatas` is padded with empty maps or truncated to match `chunks`.
    pub async fn add(
        &self,
        collection: &str,
        chunks: &[String],
        metadatas: Vec<Metadata>,
    ) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let provider = self.embeddings.require()?;
        self.collection(collection, provider.as_ref()).await?;

        let mut metadatas = metadatas;
        metadatas.resize_with(chunks.len(), Metadata::new);

        let vectors = provider.embed(chunks).await?;
        if vectors.len() != chunks.len() {
            return Err(RagError::Embedding {
                provider: provider.provider_name().to_string(),
                message: format!("expected {} vectors, got {}", chunks.len(), vectors.len()),
            });
        }

        let records: Vec<StoredRecord> = chunks
            .iter()
            .zip(metadatas)
            .zip(vectors)
            .map(|((text, metadata), embedding)| StoredRecord {
                id: uuid::Uuid::new_v4().to_string(),
                text: text.clone(),
                metadata,
                embedding,
            })
            .collect();

        let added = records.len();
        self.backend.upsert(collection, records).await?;
        tracing::debug!(collection, added, "records added");
        Ok(added)
    }

    /// Up to `k` (at least 1) records nearest to `query_text`.
    pub async fn query(&self, collection: &str, query_text: &str, k: usize) -> Result<QueryResult> {
        let provider = self.embeddings.require()?;
        self.collection(collection, provider.as_ref()).await?;

        let vector = embed_query(provider.as_ref(), query_text).await?;
        let hits = self
            .backend
            .similarity_search(collection, &vector, k.max(1))
            .await?;
        Ok(QueryResult {
            collection: collection.to_string(),
            hits,
        })
    }

    /// Chunks of the most recently added document, by ascending ordinal, at most `k` (at least 1).
    pub async fn recent(&self, collection: &str, k: usize) -> Result<Vec<ChunkEntry>> {
        let entries = self.backend.get_all(collection).await?;
        Ok(latest_document_chunks(entries, k.max(1)))
    }
}

/// Pick the last non-empty filename in append order and return its chunks.
fn latest_document_chunks(entries: Vec<ChunkEntry>, k: usize) -> Vec<ChunkEntry> {
    let Some(latest) = entries
        .iter()
        .rev()
        .filter_map(|e| filename_of(&e.metadata))
        .find(|name| !name.is_empty())
        .map(str::to_string)
    else {
        return Vec::new();
    };

    let mut chunks: Vec<ChunkEntry> = entries
        .into_iter()
        .filter(|e| filename_of(&e.metadata) == Some(latest.as_str()))
        .collect();
    chunks.sort_by_key(|e| ordinal_of(&e.metadata));
    chunks.truncate(k);
    chunks
}
