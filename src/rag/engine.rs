//! Retrieval-generation engine.
//!
//! Two explicit modes:
//! - full book: embed the query, search the collection, answer from the hits
//! - selected text: answer from a caller-supplied span without retrieval
//!
//! Backend failures never escape: they surface as the sentinel answer.

use std::sync::Arc;

use super::grounding::{
    format_context, full_book_system_prompt, full_book_user_prompt, normalize_answer,
    selected_text_system_prompt, selected_text_user_prompt, with_personalization, SENTINEL_ANSWER,
};
use super::store::VectorStore;
use super::types::{PayloadFilter, QueryResult, RagAnswer, SourceChunk, UserProfile};
use crate::core::config::RetrievalSettings;
use crate::core::errors::ApiError;
use crate::llm::{is_zero_vector, EmbeddingProvider, GenerationProvider};

#[derive(Clone)]
pub struct RagEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
    store: Arc<dyn VectorStore>,
    collection: String,
    top_k: usize,
    min_score: f32,
}

impl RagEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
        store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        retrieval: RetrievalSettings,
    ) -> Self {
        Self {
            embedder,
            generator,
            store,
            collection: collection.into(),
            top_k: retrieval.top_k.max(1),
            min_score: retrieval.min_score,
        }
    }

    pub async fn query_full_book(
        &self,
        query: &str,
        book_id: Option<&str>,
        profile: Option<&UserProfile>,
    ) -> Result<RagAnswer, ApiError> {
        let query = require_text("query", query)?;
        let book_id = book_id.map(str::trim).filter(|id| !id.is_empty());

        let vector = self.embedder.embed(query).await;
        if is_zero_vector(&vector) {
            tracing::warn!("Query embedding unavailable; answering with sentinel");
            return Ok(abstain(book_id));
        }

        let results = self.retrieve(&vector, book_id).await;
        if results.is_empty() {
            tracing::info!("No relevant chunks for query (book {:?})", book_id);
            return Ok(abstain(book_id));
        }

        let system = with_personalization(full_book_system_prompt(), profile);
        let prompt = full_book_user_prompt(&format_context(&results), query);
        let answer = normalize_answer(self.generator.generate(&system, &prompt).await);

        Ok(RagAnswer {
            answer,
            source_chunks: results.iter().map(SourceChunk::retrieved).collect(),
            book_id: book_id.map(str::to_string),
        })
    }

    /// Answers from `selected_text` alone; the vector store is never consulted.
    pub async fn query_selected_text(
        &self,
        query: &str,
        selected_text: &str,
        profile: Option<&UserProfile>,
    ) -> Result<RagAnswer, ApiError> {
        let query = require_text("query", query)?;
        let selected_text = require_text("selected_text", selected_text)?;

        let system = with_personalization(selected_text_system_prompt(), profile);
        let prompt = selected_text_user_prompt(selected_text, query);
        let answer = normalize_answer(self.generator.generate(&system, &prompt).await);

        Ok(RagAnswer {
            answer,
            source_chunks: vec![SourceChunk::selected_text(selected_text)],
            book_id: None,
        })
    }

    async fn retrieve(&self, vector: &[f32], book_id: Option<&str>) -> Vec<QueryResult> {
        let filter = book_id.map(PayloadFilter::book);
        match self
            .store
            .search(&self.collection, vector, self.top_k, filter.as_ref())
            .await
        {
            Ok(results) => results
                .into_iter()
                .filter(|result| result.score >= self.min_score)
                .collect(),
            Err(err) => {
                tracing::error!("Vector search in {} failed: {}", self.collection, err);
                Vec::new()
            }
        }
    }
}

fn require_text<'a>(field: &str, value: &'a str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest(format!("{} must not be empty", field)));
    }
    Ok(trimmed)
}

fn abstain(book_id: Option<&str>) -> RagAnswer {
    RagAnswer {
        answer: SENTINEL_ANSWER.to_string(),
        source_chunks: Vec::new(),
        book_id: book_id.map(str::to_string),
    }
}
