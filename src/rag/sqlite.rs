//! SQLite-backed vector store.
//!
//! In-process store for development and tests: payloads are JSON text,
//! vectors are little-endian f32 blobs and search is brute-force cosine.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Row, SqlitePool};

use super::store::{check_dimensions, CollectionStatus, VectorStore};
use super::types::{ChunkPayload, PayloadFilter, QueryResult, StoredRecord};
use super::vector_math::{cosine_similarity, sort_by_score_desc};
use crate::core::config::AppPaths;
use crate::core::db::open_pool;
use crate::core::errors::ApiError;

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    pub async fn new(paths: &AppPaths) -> Result<Self, ApiError> {
        Self::with_path(paths.vector_db_path.clone()).await
    }

    pub async fn with_path(db_path: PathBuf) -> Result<Self, ApiError> {
        let pool = open_pool(&db_path, 4).await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS vector_collections (
                name TEXT PRIMARY KEY,
                vector_size INTEGER NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS vector_points (
                collection TEXT NOT NULL REFERENCES vector_collections(name) ON DELETE CASCADE,
                id TEXT NOT NULL,
                payload TEXT NOT NULL DEFAULT '{}',
                embedding BLOB NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (collection, id)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    async fn vector_size(&self, collection: &str) -> Result<Option<usize>, ApiError> {
        let size: Option<i64> =
            sqlx::query_scalar("SELECT vector_size FROM vector_collections WHERE name = ?1")
                .bind(collection)
                .fetch_optional(&self.pool)
                .await
                .map_err(ApiError::internal)?;
        Ok(size.map(|s| s as usize))
    }

    async fn require_vector_size(&self, collection: &str) -> Result<usize, ApiError> {
        self.vector_size(collection)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Collection {} does not exist", collection)))
    }

    /// All payloads of a collection that pass `filter`, parsed once.
    async fn filtered_rows(
        &self,
        collection: &str,
        filter: Option<&PayloadFilter>,
        with_vectors: bool,
    ) -> Result<Vec<(String, Value, Vec<f32>)>, ApiError> {
        let sql = if with_vectors {
            "SELECT id, payload, embedding FROM vector_points WHERE collection = ?1"
        } else {
            "SELECT id, payload FROM vector_points WHERE collection = ?1"
        };
        let rows = sqlx::query(sql)
            .bind(collection)
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let payload_str: String = row.get("payload");
            let payload = serde_json::from_str::<Value>(&payload_str).map_err(ApiError::internal)?;
            if filter.is_some_and(|f| !f.matches(&payload)) {
                continue;
            }
            let vector = if with_vectors {
                let bytes: Vec<u8> = row.get("embedding");
                deserialize_embedding(&bytes)
            } else {
                Vec::new()
            };
            out.push((row.get("id"), payload, vector));
        }
        Ok(out)
    }
}

fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn ensure_collection(
        &self,
        collection: &str,
        vector_size: usize,
    ) -> Result<CollectionStatus, ApiError> {
        match self.vector_size(collection).await? {
            Some(existing) if existing == vector_size => Ok(CollectionStatus::Existing),
            Some(existing) => {
                tracing::warn!(
                    "Collection {} has vector size {} but {} is required; recreating it and discarding all stored vectors",
                    collection,
                    existing,
                    vector_size
                );
                self.recreate_collection(collection, vector_size).await?;
                Ok(CollectionStatus::Recreated)
            }
            None => {
                sqlx::query("INSERT INTO vector_collections (name, vector_size) VALUES (?1, ?2)")
                    .bind(collection)
                    .bind(vector_size as i64)
                    .execute(&self.pool)
                    .await
                    .map_err(ApiError::internal)?;
                tracing::info!("Created collection {} ({} dimensions)", collection, vector_size);
                Ok(CollectionStatus::Created)
            }
        }
    }

    async fn recreate_collection(&self, collection: &str, vector_size: usize) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        sqlx::query("DELETE FROM vector_points WHERE collection = ?1")
            .bind(collection)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        sqlx::query(
            "INSERT INTO vector_collections (name, vector_size) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET vector_size = excluded.vector_size,
                 created_at = STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now')",
        )
        .bind(collection)
        .bind(vector_size as i64)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        tx.commit().await.map_err(ApiError::internal)?;
        tracing::warn!("Recreated collection {} ({} dimensions)", collection, vector_size);
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: Vec<StoredRecord>) -> Result<usize, ApiError> {
        if records.is_empty() {
            return Ok(0);
        }
        let vector_size = self.require_vector_size(collection).await?;
        check_dimensions(&records, vector_size)?;

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        for record in &records {
            let payload = serde_json::to_string(&record.payload).map_err(ApiError::internal)?;
            sqlx::query(
                "INSERT OR REPLACE INTO vector_points (collection, id, payload, embedding, updated_at)
                 VALUES (?1, ?2, ?3, ?4, STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))",
            )
            .bind(collection)
            .bind(&record.id)
            .bind(&payload)
            .bind(serialize_embedding(&record.vector))
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        }

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(records.len())
    }

    async fn get_payload(&self, collection: &str, id: &str) -> Result<Option<ChunkPayload>, ApiError> {
        let payload: Option<String> =
            sqlx::query_scalar("SELECT payload FROM vector_points WHERE collection = ?1 AND id = ?2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(ApiError::internal)?;

        payload
            .map(|raw| serde_json::from_str::<ChunkPayload>(&raw).map_err(ApiError::internal))
            .transpose()
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<QueryResult>, ApiError> {
        let vector_size = self.require_vector_size(collection).await?;
        if vector.len() != vector_size {
            return Err(ApiError::BadRequest(format!(
                "Query vector has {} dimensions, collection {} expects {}",
                vector.len(),
                collection,
                vector_size
            )));
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let mut scored = Vec::new();
        for (id, payload, stored) in self.filtered_rows(collection, filter, true).await? {
            let score = cosine_similarity(vector, &stored)?;
            scored.push(((id, payload), score));
        }
        sort_by_score_desc(&mut scored);
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|((id, payload), score)| {
                let payload = serde_json::from_value(payload).map_err(ApiError::internal)?;
                Ok(QueryResult { id, score, payload })
            })
            .collect()
    }

    async fn count(&self, collection: &str, filter: Option<&PayloadFilter>) -> Result<usize, ApiError> {
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            return Ok(self.filtered_rows(collection, Some(filter), false).await?.len());
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vector_points WHERE collection = ?1")
            .bind(collection)
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(count as usize)
    }

    async fn delete(&self, collection: &str, filter: &PayloadFilter) -> Result<usize, ApiError> {
        if filter.is_empty() {
            return Err(ApiError::bad_request("Refusing to delete with an empty filter"));
        }
        let ids: Vec<String> = self
            .filtered_rows(collection, Some(filter), false)
            .await?
            .into_iter()
            .map(|(id, _, _)| id)
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;
        for id in &ids {
            sqlx::query("DELETE FROM vector_points WHERE collection = ?1 AND id = ?2")
                .bind(collection)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(ApiError::internal)?;
        }
        tx.commit().await.map_err(ApiError::internal)?;
        Ok(ids.len())
    }
}
