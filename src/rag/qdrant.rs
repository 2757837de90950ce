//! Qdrant REST adapter.
//!
//! Talks to the HTTP API directly with reqwest. Collections use cosine
//! distance, and `book_id` gets a keyword index so filtered search stays fast.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::store::{check_dimensions, CollectionStatus, VectorStore};
use super::types::{ChunkPayload, PayloadFilter, QueryResult, StoredRecord};
use crate::core::config::VectorStoreSettings;
use crate::core::errors::ApiError;

const INDEXED_FIELDS: [&str; 1] = ["book_id"];

#[derive(Clone)]
pub struct QdrantStore {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    config: CollectionConfig,
}

#[derive(Debug, Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Debug, Deserialize)]
struct CollectionParams {
    vectors: VectorParams,
}

/// Single unnamed vector config; named vectors are not used by this service.
#[derive(Debug, Deserialize)]
struct VectorParams {
    size: usize,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RetrievedPoint {
    #[serde(default)]
    payload: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: usize,
}

impl QdrantStore {
    pub fn new(settings: &VectorStoreSettings, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(ApiError::internal)?;
        Ok(Self {
            http,
            base_url: settings.url.trim_end_matches('/').to_string(),
            api_key: settings
                .api_key
                .as_deref()
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string),
        })
    }

    fn collection_url(&self, collection: &str, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, collection, suffix)
    }

    /// Sends a request and returns the status with the raw body.
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<(StatusCode, String), ApiError> {
        let mut request = self.http.request(method, url);
        if let Some(key) = &self.api_key {
            request = request.header("api-key", key);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let resp = request.send().await.map_err(|e| {
            tracing::error!("Qdrant request to {} failed: {}", url, e);
            ApiError::ServiceUnavailable
        })?;
        let status = resp.status();
        let text = resp.text().await.map_err(ApiError::internal)?;
        Ok((status, text))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<T, ApiError> {
        let (status, text) = self.send(method, url, body).await?;
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(format!("Qdrant: {}", text)));
        }
        if !status.is_success() {
            return Err(ApiError::Internal(format!("Qdrant returned {}: {}", status, text)));
        }
        let envelope: Envelope<T> = serde_json::from_str(&text)
            .map_err(|e| ApiError::Internal(format!("Unexpected Qdrant response: {}: {}", e, text)))?;
        Ok(envelope.result)
    }

    async fn collection_size(&self, collection: &str) -> Result<Option<usize>, ApiError> {
        let url = self.collection_url(collection, "");
        match self.call::<CollectionInfo>(Method::GET, &url, None).await {
            Ok(info) => Ok(Some(info.config.params.vectors.size)),
            Err(ApiError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn create_collection(&self, collection: &str, vector_size: usize) -> Result<(), ApiError> {
        let url = self.collection_url(collection, "");
        let body = json!({ "vectors": { "size": vector_size, "distance": "Cosine" } });
        self.call::<Value>(Method::PUT, &url, Some(&body)).await?;

        for field in INDEXED_FIELDS {
            let body = json!({ "field_name": field, "field_schema": "keyword" });
            let url = self.collection_url(collection, "/index?wait=true");
            if let Err(err) = self.call::<Value>(Method::PUT, &url, Some(&body)).await {
                tracing::warn!("Failed to index payload field {} on {}: {}", field, collection, err);
            }
        }
        Ok(())
    }

    async fn delete_collection(&self, collection: &str) -> Result<(), ApiError> {
        let url = self.collection_url(collection, "");
        match self.call::<Value>(Method::DELETE, &url, None).await {
            Ok(_) | Err(ApiError::NotFound(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

pub(crate) fn filter_body(filter: &PayloadFilter) -> Value {
    let matches = filter
        .must
        .iter()
        .map(|condition| json!({ "key": condition.key, "match": { "value": condition.value } }));
    let ranges = filter
        .at_least
        .iter()
        .map(|range| json!({ "key": range.key, "range": { "gte": range.gte } }));
    let must: Vec<Value> = matches.chain(ranges).collect();
    json!({ "must": must })
}

fn point_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_payload(payload: Option<Value>) -> Result<ChunkPayload, ApiError> {
    serde_json::from_value(payload.unwrap_or(Value::Null)).map_err(ApiError::internal)
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn name(&self) -> &str {
        "qdrant"
    }

    async fn ensure_collection(
        &self,
        collection: &str,
        vector_size: usize,
    ) -> Result<CollectionStatus, ApiError> {
        match self.collection_size(collection).await? {
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
                self.create_collection(collection, vector_size).await?;
                tracing::info!("Created collection {} ({} dimensions)", collection, vector_size);
                Ok(CollectionStatus::Created)
            }
        }
    }

    async fn recreate_collection(&self, collection: &str, vector_size: usize) -> Result<(), ApiError> {
        self.delete_collection(collection).await?;
        self.create_collection(collection, vector_size).await?;
        tracing::warn!("Recreated collection {} ({} dimensions)", collection, vector_size);
        Ok(())
    }

    async fn upsert(&self, collection: &str, records: Vec<StoredRecord>) -> Result<usize, ApiError> {
        if records.is_empty() {
            return Ok(0);
        }
        let vector_size = self
            .collection_size(collection)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Collection {} does not exist", collection)))?;
        check_dimensions(&records, vector_size)?;

        let points: Vec<Value> = records
            .iter()
            .map(|record| json!({ "id": record.id, "vector": record.vector, "payload": record.payload }))
            .collect();
        let url = self.collection_url(collection, "/points?wait=true");
        self.call::<Value>(Method::PUT, &url, Some(&json!({ "points": points })))
            .await?;
        Ok(records.len())
    }

    async fn get_payload(&self, collection: &str, id: &str) -> Result<Option<ChunkPayload>, ApiError> {
        let url = self.collection_url(collection, "/points");
        let body = json!({ "ids": [id], "with_payload": true, "with_vector": false });
        let points: Vec<RetrievedPoint> = self.call(Method::POST, &url, Some(&body)).await?;
        points
            .into_iter()
            .next()
            .map(|point| parse_payload(point.payload))
            .transpose()
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<QueryResult>, ApiError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let mut body = json!({ "vector": vector, "limit": top_k, "with_payload": true });
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            body["filter"] = filter_body(filter);
        }

        let url = self.collection_url(collection, "/points/search");
        let points: Vec<ScoredPoint> = self.call(Method::POST, &url, Some(&body)).await?;
        points
            .into_iter()
            .map(|point| {
                Ok(QueryResult {
                    id: point_id(&point.id),
                    score: point.score,
                    payload: parse_payload(point.payload)?,
                })
            })
            .collect()
    }

    async fn count(&self, collection: &str, filter: Option<&PayloadFilter>) -> Result<usize, ApiError> {
        let mut body = json!({ "exact": true });
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            body["filter"] = filter_body(filter);
        }
        let url = self.collection_url(collection, "/points/count");
        let result: CountResult = self.call(Method::POST, &url, Some(&body)).await?;
        Ok(result.count)
    }

    async fn delete(&self, collection: &str, filter: &PayloadFilter) -> Result<usize, ApiError> {
        if filter.is_empty() {
            return Err(ApiError::bad_request("Refusing to delete with an empty filter"));
        }
        let matching = match self.count(collection, Some(filter)).await {
            Ok(count) => count,
            Err(ApiError::NotFound(_)) => return Ok(0),
            Err(err) => return Err(err),
        };
        if matching == 0 {
            return Ok(0);
        }

        let url = self.collection_url(collection, "/points/delete?wait=true");
        let body = json!({ "filter": filter_body(filter) });
        self.call::<Value>(Method::POST, &url, Some(&body)).await?;
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_serializes_as_must_match() {
        let filter = PayloadFilter::book("physical-ai").with("page_number", 2);

        assert_eq!(
            filter_body(&filter),
            json!({
                "must": [
                    { "key": "book_id", "match": { "value": "physical-ai" } },
                    { "key": "page_number", "match": { "value": 2 } }
                ]
            })
        );
    }

    #[test]
    fn lower_bounds_serialize_as_ranges() {
        let filter = PayloadFilter::page_tail("physical-ai", 3, 4);

        assert_eq!(
            filter_body(&filter),
            json!({
                "must": [
                    { "key": "book_id", "match": { "value": "physical-ai" } },
                    { "key": "page_number", "match": { "value": 3 } },
                    { "key": "chunk_number", "range": { "gte": 4 } }
                ]
            })
        );
    }

    #[test]
    fn parses_collection_info_and_scored_points() {
        let info: Envelope<CollectionInfo> = serde_json::from_value(json!({
            "result": {
                "status": "green",
                "config": { "params": { "vectors": { "size": 1024, "distance": "Cosine" } } }
            },
            "status": "ok",
            "time": 0.001
        }))
        .unwrap();
        assert_eq!(info.result.config.params.vectors.size, 1024);

        let points: Envelope<Vec<ScoredPoint>> = serde_json::from_value(json!({
            "result": [{ "id": 42, "version": 1, "score": 0.87, "payload": null }]
        }))
        .unwrap();
        assert_eq!(point_id(&points.result[0].id), "42");
        assert!((points.result[0].score - 0.87).abs() < 1e-6);
    }

    #[test]
    fn api_key_is_optional() {
        let mut settings = VectorStoreSettings::default();
        settings.api_key = Some("  ".to_string());

        let store = QdrantStore::new(&settings, Duration::from_secs(5)).unwrap();

        assert!(store.api_key.is_none());
        assert_eq!(
            store.collection_url("docs", "/points/search"),
            "http://localhost:6333/collections/docs/points/search"
        );
    }
}
