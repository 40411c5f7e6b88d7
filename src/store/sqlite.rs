//! SQLite index backend.
//!
//! One database file, `index.sqlite`, in the store directory:
//!
//! ```text
//! collections(name PK, embedding_model, dims, created_at)
//! records(seq AUTOINCREMENT PK, id UNIQUE, collection, text, metadata_json, embedding BLOB)
//! ```
//!
//! `seq` is the append order that `get_all` and distance ties rely on.
//! Embeddings are little-endian `f32` BLOBs; search loads a collection's
//! vectors and ranks them in Rust.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tokio::sync::OnceCell;

use super::{rank_nearest, CollectionInfo, IndexBackend};
use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::{RagError, Result};
use crate::models::{ChunkEntry, Metadata, QueryHit, StoredRecord};

pub const DB_FILE: &str = "index.sqlite";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS collections (
        name TEXT PRIMARY KEY,
        embedding_model TEXT NOT NULL,
        dims INTEGER NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS records (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        collection TEXT NOT NULL,
        text TEXT NOT NULL,
        metadata_json TEXT NOT NULL DEFAULT '{}',
        embedding BLOB NOT NULL,
        FOREIGN KEY (collection) REFERENCES collections(name)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_records_collection_seq ON records(collection, seq)",
];

/// Persistent backend; the connection pool opens on first use.
pub struct SqliteBackend {
    dir: PathBuf,
    pool: OnceCell<SqlitePool>,
}

impl SqliteBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            pool: OnceCell::new(),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.join(DB_FILE)
    }

    async fn pool(&self) -> Result<&SqlitePool> {
        self.pool.get_or_try_init(|| connect(&self.dir)).await
    }
}

/// Open the pool and create the schema; any failure is a configuration error.
async fn connect(dir: &Path) -> Result<SqlitePool> {
    open_pool(dir).await.map_err(|e| {
        tracing::error!(path = %dir.display(), error = %e, "store initialization failed");
        RagError::Configuration(format!("store init at {}: {}", dir.display(), e))
    })
}

async fn open_pool(dir: &Path) -> Result<SqlitePool> {
    std::fs::create_dir_all(dir).map_err(|e| RagError::io(dir, e))?;
    let db_path = dir.join(DB_FILE);

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    for statement in SCHEMA {
        sqlx::query(statement).execute(&pool).await?;
    }
    tracing::debug!(path = %db_path.display(), "sqlite index ready");
    Ok(pool)
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<ChunkEntry> {
    let metadata_json: String = row.try_get("metadata_json")?;
    let metadata: Metadata = serde_json::from_str(&metadata_json)
        .map_err(|e| RagError::store("sqlite", format!("corrupt metadata: {}", e)))?;
    Ok(ChunkEntry {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
        metadata,
    })
}

fn row_to_info(row: &sqlx::sqlite::SqliteRow) -> Result<CollectionInfo> {
    let dims: i64 = row.try_get("dims")?;
    Ok(CollectionInfo {
        name: row.try_get("name")?,
        embedding_model: row.try_get("embedding_model")?,
        dims: dims as usize,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl IndexBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn init(&self) -> Result<()> {
        self.pool().await.map(|_| ())
    }

    async fn create_or_get(&self, name: &str, model: &str, dims: usize) -> Result<CollectionInfo> {
        let pool = self.pool().await?;

        sqlx::query(
            "INSERT OR IGNORE INTO collections (name, embedding_model, dims, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(name)
        .bind(model)
        .bind(dims as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(pool)
        .await?;

        let row = sqlx::query(
            "SELECT name, embedding_model, dims, created_at FROM collections WHERE name = ?",
        )
        .bind(name)
        .fetch_one(pool)
        .await?;
        row_to_info(&row)
    }

    async fn upsert(&self, collection: &str, records: Vec<StoredRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;

        for record in &records {
            let metadata_json = serde_json::to_string(&record.metadata)
                .map_err(|e| RagError::store("sqlite", e))?;
            sqlx::query(
                r#"
                INSERT INTO records (id, collection, text, metadata_json, embedding)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    text = excluded.text,
                    metadata_json = excluded.metadata_json,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&record.id)
            .bind(collection)
            .bind(&record.text)
            .bind(&metadata_json)
            .bind(vec_to_blob(&record.embedding))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn similarity_search(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<QueryHit>> {
        let pool = self.pool().await?;
        let rows = sqlx::query(
            "SELECT id, text, metadata_json, embedding FROM records WHERE collection = ? ORDER BY seq",
        )
        .bind(collection)
        .fetch_all(pool)
        .await?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.try_get("embedding")?;
            candidates.push((row_to_entry(row)?, blob_to_vec(&blob)));
        }
        Ok(rank_nearest(vector, candidates, k))
    }

    async fn get_all(&self, collection: &str) -> Result<Vec<ChunkEntry>> {
        let pool = self.pool().await?;
        let rows = sqlx::query(
            "SELECT id, text, metadata_json FROM records WHERE collection = ? ORDER BY seq",
        )
        .bind(collection)
        .fetch_all(pool)
        .await?;
        rows.iter().map(row_to_entry).collect()
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let pool = self.pool().await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?")
            .bind(collection)
            .fetch_one(pool)
            .await?;
        Ok(count as usize)
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let pool = self.pool().await?;
        let rows = sqlx::query(
            "SELECT name, embedding_model, dims, created_at FROM collections ORDER BY name",
        )
        .fetch_all(pool)
        .await?;
        rows.iter().map(row_to_info).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chunk_metadata;
    use tempfile::TempDir;

    fn record(id: &str, ordinal: usize, embedding: Vec<f32>) -> StoredRecord {
        StoredRecord {
            id: id.to_string(),
            text: format!("chunk {}", id),
            metadata: chunk_metadata("doc.txt", ordinal),
            embedding,
        }
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let backend = SqliteBackend::new(tmp.path().join("index"));
        backend.init().await.unwrap();
        backend.init().await.unwrap();
        assert!(backend.db_path().exists());

        let reopened = SqliteBackend::new(tmp.path().join("index"));
        reopened.init().await.unwrap();
    }

    #[tokio::test]
    async fn test_unusable_store_path_is_configuration_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let backend = SqliteBackend::new(blocker.join("index"));
        let err = backend.init().await.unwrap_err();
        assert!(err.is_configuration(), "got {:?}", err);
        assert!(!err.is_input());
        assert!(err.to_string().contains("store init"));

        let err = backend.count("docs").await.unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_records_persist_across_instances() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("index");
        {
            let backend = SqliteBackend::new(&dir);
            let info = backend.create_or_get("docs", "model-a", 2).await.unwrap();
            assert_eq!(info.dims, 2);
            backend
                .upsert(
                    "docs",
                    vec![record("r1", 0, vec![1.0, 0.0]), record("r2", 1, vec![0.0, 1.0])],
                )
                .await
                .unwrap();
        }

        let backend = SqliteBackend::new(&dir);
        let info = backend.create_or_get("docs", "model-b", 8).await.unwrap();
        assert_eq!(info.embedding_model, "model-a");
        assert_eq!(info.dims, 2);

        let all = backend.get_all("docs").await.unwrap();
        let ids: Vec<&str> = all.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2"]);
        assert_eq!(all[1].metadata, chunk_metadata("doc.txt", 1));

        let hits = backend.similarity_search("docs", &[0.1, 1.0], 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "r2");
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let tmp = TempDir::new().unwrap();
        let backend = SqliteBackend::new(tmp.path());
        backend.create_or_get("a", "m", 1).await.unwrap();
        backend.create_or_get("b", "m", 1).await.unwrap();
        backend.upsert("a", vec![record("x", 0, vec![1.0])]).await.unwrap();

        assert_eq!(backend.count("a").await.unwrap(), 1);
        assert_eq!(backend.count("b").await.unwrap(), 0);
        assert!(backend.get_all("b").await.unwrap().is_empty());
        let names: Vec<String> = backend
            .list_collections()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_upsert_into_unknown_collection_fails() {
        let tmp = TempDir::new().unwrap();
        let backend = SqliteBackend::new(tmp.path());
        let err = backend
            .upsert("ghost", vec![record("x", 0, vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Store { .. }));
        assert_eq!(backend.count("ghost").await.unwrap(), 0);
    }
}
