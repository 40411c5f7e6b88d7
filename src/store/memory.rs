use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{rank_nearest, CollectionInfo, IndexBackend};
use crate::error::{RagError, Result};
use crate::models::{ChunkEntry, QueryHit, StoredRecord};

#[derive(Default)]
struct MemoryCollection {
    info: Option<CollectionInfo>,
    records: Vec<StoredRecord>,
}

/// Process-local backend. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryBackend {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn unknown(collection: &str) -> RagError {
    RagError::store("memory", format!("collection {} does not exist", collection))
}

#[async_trait]
impl IndexBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn create_or_get(&self, name: &str, model: &str, dims: usize) -> Result<CollectionInfo> {
        let mut collections = self.collections.write().await;
        let collection = collections.entry(name.to_string()).or_default();
        let info = collection.info.get_or_insert_with(|| CollectionInfo {
            name: name.to_string(),
            embedding_model: model.to_string(),
            dims,
            created_at: chrono::Utc::now().timestamp(),
        });
        Ok(info.clone())
    }

    async fn upsert(&self, collection: &str, records: Vec<StoredRecord>) -> Result<()> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| unknown(collection))?;
        target.records.extend(records);
        Ok(())
    }

    async fn similarity_search(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<QueryHit>> {
        let collections = self.collections.read().await;
        let Some(target) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let candidates = target.records.iter().map(|r| {
            (
                ChunkEntry {
                    id: r.id.clone(),
                    text: r.text.clone(),
                    metadata: r.metadata.clone(),
                },
                r.embedding.clone(),
            )
        });
        Ok(rank_nearest(vector, candidates, k))
    }

    async fn get_all(&self, collection: &str) -> Result<Vec<ChunkEntry>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|c| {
                c.records
                    .iter()
                    .map(|r| ChunkEntry {
                        id: r.id.clone(),
                        text: r.text.clone(),
                        metadata: r.metadata.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map_or(0, |c| c.records.len()))
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let collections = self.collections.read().await;
        let mut infos: Vec<CollectionInfo> = collections
            .values()
            .filter_map(|c| c.info.clone())
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }
}
