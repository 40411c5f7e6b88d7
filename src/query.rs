//! Read side of the index: similarity search and "latest document" lookup,
//! with collection and `k` defaults taken from `[retrieval]`.

use std::sync::Arc;

use crate::config::RetrievalConfig;
use crate::error::{RagError, Result};
use crate::models::{ChunkEntry, QueryResult};
use crate::vectorstore::VectorStore;

pub struct QueryService {
    store: Arc<VectorStore>,
    defaults: RetrievalConfig,
}

impl QueryService {
    pub fn new(store: Arc<VectorStore>, defaults: RetrievalConfig) -> Self {
        Self { store, defaults }
    }

    fn collection<'a>(&'a self, collection: Option<&'a str>) -> &'a str {
        collection
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(self.defaults.default_collection.as_str())
    }

    /// Nearest chunks to `text`. A blank query is an input error.
    pub async fn search(
        &self,
        text: &str,
        collection: Option<&str>,
        k: Option<usize>,
    ) -> Result<QueryResult> {
        if text.trim().is_empty() {
            return Err(RagError::Input("query text is empty".to_string()));
        }
        let collection = self.collection(collection);
        let k = k.unwrap_or(self.defaults.default_k);
        tracing::debug!(collection, k, "similarity query");
        self.store.query(collection, text, k).await
    }

    /// Chunks of the most recently ingested document.
    pub async fn recent(&self, collection: Option<&str>, k: Option<usize>) -> Result<Vec<ChunkEntry>> {
        let collection = self.collection(collection);
        self.store
            .recent(collection, k.unwrap_or(self.defaults.default_k))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingSelection, HashProvider};
    use crate::models::chunk_metadata;
    use crate::store::MemoryBackend;

    async fn service() -> QueryService {
        let store = Arc::new(VectorStore::new(
            Arc::new(MemoryBackend::new()),
            EmbeddingSelection::with_provider(Arc::new(HashProvider::new(64))),
        ));
        let texts: Vec<String> = (0..8).map(|i| format!("chunk number {}", i)).collect();
        let metas = (0..8).map(|i| chunk_metadata("doc.txt", i)).collect();
        store.add("default", &texts, metas).await.unwrap();
        QueryService::new(store, RetrievalConfig::default())
    }

    #[tokio::test]
    async fn test_defaults_apply() {
        let service = service().await;
        let result = service.search("chunk number 3", None, None).await.unwrap();
        assert_eq!(result.collection, "default");
        assert_eq!(result.len(), 5);
        assert_eq!(service.recent(Some("  "), None).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_explicit_k_and_collection() {
        let service = service().await;
        let result = service.search("chunk", Some("default"), Some(2)).await.unwrap();
        assert_eq!(result.len(), 2);
        let other = service.search("chunk", Some("other"), Some(2)).await.unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn test_blank_query_rejected() {
        let service = service().await;
        let err = service.search("   ", None, None).await.unwrap_err();
        assert!(err.is_input());
    }
}
