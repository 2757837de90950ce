use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TranslationRequest {
    pub text: String,
    pub target_language: Option<String>,
}

pub async fn translate(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TranslationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let translation = state
        .translator
        .translate(&payload.text, payload.target_language.as_deref())
        .await?;
    Ok(Json(translation))
}
