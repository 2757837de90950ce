use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::auth::optional_user;
use crate::auth::User;
use crate::core::errors::ApiError;
use crate::history::{ChatLogEntry, QueryMode};
use crate::rag::{RagAnswer, SourceChunk, UserProfile};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub book_id: Option<String>,
    pub user_profile: Option<UserProfile>,
    pub session_id: Option<String>,
    /// Book page the question was asked from, kept in the chat log.
    pub page_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SelectedTextRequest {
    pub query: String,
    pub selected_text: String,
    pub user_profile: Option<UserProfile>,
    pub session_id: Option<String>,
    pub page_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub source_chunks: Vec<SourceChunk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_id: Option<String>,
    pub session_id: String,
}

pub async fn query(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = optional_user(&state, &headers).await;
    let profile = resolve_profile(&state, payload.user_profile, user.as_ref()).await;
    let session_id = session_id_or_new(payload.session_id);

    let answer = state
        .engine
        .query_full_book(&payload.query, payload.book_id.as_deref(), profile.as_ref())
        .await?;

    let exchange = Exchange {
        session_id: &session_id,
        user: user.as_ref(),
        mode: QueryMode::FullBook,
        page_url: payload.page_url.as_deref(),
        query: &payload.query,
    };
    record(&state, exchange, &answer).await;
    Ok(Json(respond(answer, session_id)))
}

pub async fn selected_text(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<SelectedTextRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = optional_user(&state, &headers).await;
    let profile = resolve_profile(&state, payload.user_profile, user.as_ref()).await;
    let session_id = session_id_or_new(payload.session_id);

    let answer = state
        .engine
        .query_selected_text(&payload.query, &payload.selected_text, profile.as_ref())
        .await?;

    let exchange = Exchange {
        session_id: &session_id,
        user: user.as_ref(),
        mode: QueryMode::SelectedText,
        page_url: payload.page_url.as_deref(),
        query: &payload.query,
    };
    record(&state, exchange, &answer).await;
    Ok(Json(respond(answer, session_id)))
}

/// Inline profile first, then the signed-in user's stored one.
async fn resolve_profile(
    state: &AppState,
    inline: Option<UserProfile>,
    user: Option<&User>,
) -> Option<UserProfile> {
    if inline.is_some() {
        return inline;
    }
    let user = user?;
    match state.auth.profile(&user.id).await {
        Ok(profile) => Some(profile),
        Err(err) => {
            tracing::warn!("Failed to load profile for {}: {}", user.id, err);
            None
        }
    }
}

fn session_id_or_new(session_id: Option<String>) -> String {
    session_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Who asked what, and from where.
struct Exchange<'a> {
    session_id: &'a str,
    user: Option<&'a User>,
    mode: QueryMode,
    page_url: Option<&'a str>,
    query: &'a str,
}

fn log_entry(exchange: Exchange<'_>, answer: &RagAnswer) -> ChatLogEntry {
    let source_chunks = match serde_json::to_value(&answer.source_chunks) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!("Failed to serialize source chunks for chat log: {}", err);
            serde_json::Value::Array(Vec::new())
        }
    };
    ChatLogEntry {
        session_id: exchange.session_id.to_string(),
        user_id: exchange.user.map(|u| u.id.clone()),
        mode: exchange.mode,
        book_id: answer.book_id.clone(),
        page_url: exchange.page_url.map(str::to_string),
        query: exchange.query.to_string(),
        response: answer.answer.clone(),
        source_chunks,
    }
}

/// Appends the exchange to the chat log. Failures never fail the request.
async fn record(state: &AppState, exchange: Exchange<'_>, answer: &RagAnswer) {
    let entry = log_entry(exchange, answer);
    if let Err(err) = state.history.append(&entry).await {
        tracing::warn!("Failed to append chat log for session {}: {}", entry.session_id, err);
    }
}

fn respond(answer: RagAnswer, session_id: String) -> QueryResponse {
    QueryResponse {
        answer: answer.answer,
        source_chunks: answer.source_chunks,
        book_id: answer.book_id,
        session_id,
    }
}
