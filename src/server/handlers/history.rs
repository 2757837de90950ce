use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::auth::require_user;
use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<i64>,
}

/// The caller's own log rows for a session.
pub async fn session_logs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
    Query(params): Query<LogsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&state, &headers).await?;
    let logs = state
        .history
        .list_by_session(&session_id, Some(&user.id), params.limit)
        .await?;
    Ok(Json(json!({ "logs": logs })))
}
