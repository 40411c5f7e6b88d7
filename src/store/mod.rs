//! Index backends behind the [`VectorStore`](crate::vectorstore::VectorStore).
//!
//! A backend persists collections of [`StoredRecord`]s and answers two
//! questions about them: which records are nearest to a vector, and what is
//! in the collection, in the order it was added. Collection caching and
//! embedding live one layer up.
//!
//! | Backend | Storage | Use |
//! |---------|---------|-----|
//! | [`SqliteBackend`] | `index.sqlite` (WAL) in the store directory | default, persistent |
//! | [`MemoryBackend`] | process memory | tests, throwaway runs |

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::Serialize;

use crate::embedding::cosine_distance;
use crate::error::Result;
use crate::models::{ChunkEntry, QueryHit, StoredRecord};

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

/// A collection as recorded by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    /// Embedding model the collection was created with.
    pub embedding_model: String,
    pub dims: usize,
    /// Unix seconds.
    pub created_at: i64,
}

#[async_trait]
pub trait IndexBackend: Send + Sync {
    /// Short backend name used in errors and logs.
    fn name(&self) -> &'static str;

    /// Prepare storage (directories, schema). Idempotent.
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Return the named collection, creating it with `model` and `dims` if absent.
    ///
    /// An existing collection keeps the model and dims it was created with.
    async fn create_or_get(&self, name: &str, model: &str, dims: usize) -> Result<CollectionInfo>;

    /// Append records to a collection; all or nothing.
    async fn upsert(&self, collection: &str, records: Vec<StoredRecord>) -> Result<()>;

    /// Up to `k` records nearest to `vector`, by ascending cosine distance.
    async fn similarity_search(&self, collection: &str, vector: &[f32], k: usize)
        -> Result<Vec<QueryHit>>;

    /// Every record in the collection, in append order.
    async fn get_all(&self, collection: &str) -> Result<Vec<ChunkEntry>>;

    /// Record count of a collection (0 when it does not exist).
    async fn count(&self, collection: &str) -> Result<usize>;

    /// All collections, by name.
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>>;
}

/// Rank candidates by cosine distance to `query`, keeping the `k` nearest.
///
/// `candidates` must come in append order: the sort is stable, so equal
/// distances keep that order.
pub(crate) fn rank_nearest<I>(query: &[f32], candidates: I, k: usize) -> Vec<QueryHit>
where
    I: IntoIterator<Item = (ChunkEntry, Vec<f32>)>,
{
    let mut hits: Vec<QueryHit> = candidates
        .into_iter()
        .map(|(entry, embedding)| QueryHit {
            distance: cosine_distance(query, &embedding),
            id: entry.id,
            text: entry.text,
            metadata: entry.metadata,
        })
        .collect();

    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;

    fn entry(id: &str) -> ChunkEntry {
        ChunkEntry {
            id: id.to_string(),
            text: id.to_string(),
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn test_rank_nearest_orders_and_truncates() {
        let candidates = vec![
            (entry("far"), vec![0.0, 1.0]),
            (entry("near"), vec![1.0, 0.1]),
            (entry("exact"), vec![2.0, 0.0]),
        ];
        let hits = rank_nearest(&[1.0, 0.0], candidates, 2);
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "near"]);
        assert!(hits[0].distance.abs() < 1e-6);
    }

    #[test]
    fn test_rank_nearest_ties_keep_append_order() {
        let candidates = vec![
            (entry("first"), vec![1.0, 0.0]),
            (entry("second"), vec![1.0, 0.0]),
            (entry("third"), vec![1.0, 0.0]),
        ];
        let hits = rank_nearest(&[1.0, 0.0], candidates, 3);
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }
}
