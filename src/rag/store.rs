//! VectorStore trait: the narrow interface the pipeline and engine use to
//! talk to a vector database.
//!
//! Implementations: `QdrantStore` (REST) and `SqliteVectorStore` (embedded).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::types::{ChunkPayload, PayloadFilter, QueryResult, StoredRecord};
use crate::core::errors::ApiError;

/// Outcome of `ensure_collection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    Created,
    Existing,
    /// The collection existed with a different vector size and was wiped.
    Recreated,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// Idempotent. A collection whose vector size differs from `vector_size`
    /// is destroyed and recreated empty.
    async fn ensure_collection(
        &self,
        collection: &str,
        vector_size: usize,
    ) -> Result<CollectionStatus, ApiError>;

    /// Drops every record and recreates the collection with `vector_size`.
    async fn recreate_collection(&self, collection: &str, vector_size: usize)
        -> Result<(), ApiError>;

    /// Insert-or-replace by id. Every vector must match the collection size.
    async fn upsert(&self, collection: &str, records: Vec<StoredRecord>) -> Result<usize, ApiError>;

    async fn get_payload(&self, collection: &str, id: &str)
        -> Result<Option<ChunkPayload>, ApiError>;

    /// Most similar records first, at most `top_k`. The filter narrows the
    /// candidates before the cutoff.
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<QueryResult>, ApiError>;

    async fn count(&self, collection: &str, filter: Option<&PayloadFilter>) -> Result<usize, ApiError>;

    /// Removes every record matching `filter` and returns how many went.
    /// An empty filter is rejected; use `recreate_collection` to wipe.
    async fn delete(&self, collection: &str, filter: &PayloadFilter) -> Result<usize, ApiError>;
}

pub(crate) fn check_dimensions(records: &[StoredRecord], vector_size: usize) -> Result<(), ApiError> {
    match records.iter().find(|r| r.vector.len() != vector_size) {
        Some(record) => Err(ApiError::BadRequest(format!(
            "Vector for record {} has {} dimensions, collection expects {}",
            record.id,
            record.vector.len(),
            vector_size
        ))),
        None => Ok(()),
    }
}
