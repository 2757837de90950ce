use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::core::errors::ApiError;
use crate::core::security::require_api_key;
use crate::rag::IngestOptions;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub directory: String,
    pub book_id: String,
    #[serde(default)]
    pub recreate: bool,
}

pub async fn ingest(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<IngestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.admin_key)?;

    let directory = resolve_directory(&state.paths.project_root, &payload.directory)?;
    let report = state
        .pipeline
        .ingest_directory(
            &directory,
            &payload.book_id,
            IngestOptions {
                recreate: payload.recreate,
            },
        )
        .await?;
    Ok(Json(report))
}

/// Relative directories are taken from the project root.
fn resolve_directory(project_root: &Path, raw: &str) -> Result<PathBuf, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ApiError::bad_request("directory must not be empty"));
    }
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(project_root.join(path))
    }
}
