//! Process-scoped wiring: built once at startup, shared by every command.
//!
//! Owns the things that must exist exactly once per process: the selected
//! embedding provider, the index backend, and the collection cache inside the
//! [`VectorStore`]. Everything else borrows from here.

use std::sync::Arc;

use crate::config::Config;
use crate::embedding::{select_provider, EmbeddingSelection};
use crate::error::Result;
use crate::extract::Extractor;
use crate::ingest::IngestionPipeline;
use crate::query::QueryService;
use crate::store::{IndexBackend, SqliteBackend};
use crate::vectorstore::VectorStore;

pub struct RagContext {
    pub config: Config,
    pub extractor: Arc<Extractor>,
    pub store: Arc<VectorStore>,
    pub pipeline: IngestionPipeline,
    pub query: QueryService,
}

impl RagContext {
    /// Select the embedding provider and open the SQLite store from `config`.
    pub async fn build(config: Config) -> Result<Self> {
        let embeddings = select_provider(&config.embedding).await;
        let backend: Arc<dyn IndexBackend> = Arc::new(SqliteBackend::new(&config.store.path));
        backend.init().await?;
        Ok(Self::assemble(config, backend, embeddings))
    }

    /// Wire a context around an explicit backend and provider selection.
    pub fn assemble(
        config: Config,
        backend: Arc<dyn IndexBackend>,
        embeddings: EmbeddingSelection,
    ) -> Self {
        let extractor = Arc::new(Extractor::with_default_engines());
        let store = Arc::new(VectorStore::new(backend, embeddings));
        let pipeline = IngestionPipeline::new(
            Arc::clone(&extractor),
            Arc::clone(&store),
            config.chunking.clone(),
        );
        let query = QueryService::new(Arc::clone(&store), config.retrieval.clone());

        Self {
            config,
            extractor,
            store,
            pipeline,
            query,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashProvider;
    use crate::store::MemoryBackend;

    #[tokio::test]
    async fn test_assembled_context_shares_one_store() {
        let ctx = RagContext::assemble(
            Config::default(),
            Arc::new(MemoryBackend::new()),
            EmbeddingSelection::with_provider(Arc::new(HashProvider::new(32))),
        );
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        std::fs::write(&path, "Shared context objects keep one collection cache.").unwrap();
        let report = ctx.pipeline.ingest(&path, "a.txt", "default").await.unwrap();
        assert_eq!(report.chunks, 1);

        let recent = ctx.query.recent(None, None).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(ctx.store.backend().count("default").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_build_opens_sqlite_store() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.store.path = tmp.path().join("index");
        config.embedding.providers = vec!["hash".to_string()];
        let ctx = RagContext::build(config).await.unwrap();
        assert_eq!(ctx.store.embeddings().active_name(), Some("hash"));
        assert!(tmp.path().join("index").join("index.sqlite").exists());
    }

    #[tokio::test]
    async fn test_build_with_blocked_store_path_is_configuration_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "regular file").unwrap();

        let mut config = Config::default();
        config.store.path = blocker.join("index");
        config.embedding.providers = vec!["hash".to_string()];
        let err = RagContext::build(config).await.err().unwrap();
        assert!(err.is_configuration(), "got {:?}", err);
    }
}
