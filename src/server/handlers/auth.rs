use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::auth::User;
use crate::core::errors::ApiError;
use crate::core::security::bearer_token;
use crate::rag::UserProfile;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

/// The bearer token's user, or `Unauthorized`.
pub(crate) async fn require_user(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let token = bearer_token(headers).ok_or(ApiError::Unauthorized)?;
    state.auth.authenticate(&token).await
}

/// The bearer token's user when one is sent and valid. Anonymous otherwise.
pub(crate) async fn optional_user(state: &AppState, headers: &HeaderMap) -> Option<User> {
    let token = bearer_token(headers)?;
    match state.auth.authenticate(&token).await {
        Ok(user) => Some(user),
        Err(err) => {
            tracing::debug!("Ignoring bearer token on optional-auth route: {}", err);
            None
        }
    }
}

pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let grant = state
        .auth
        .signup(&payload.email, &payload.password, payload.name.as_deref())
        .await?;
    Ok(Json(grant))
}

pub async fn signin(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SigninRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let grant = state.auth.signin(&payload.email, &payload.password).await?;
    Ok(Json(grant))
}

pub async fn signout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = bearer_token(&headers).ok_or(ApiError::Unauthorized)?;
    let removed = state.auth.signout(&token).await?;
    Ok(Json(json!({ "success": removed })))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&state, &headers).await?;
    let profile = state.auth.profile(&user.id).await?;
    Ok(Json(json!({ "user": user, "profile": profile })))
}

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&state, &headers).await?;
    let profile = state.auth.profile(&user.id).await?;
    Ok(Json(json!({ "profile": profile })))
}

pub async fn put_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(profile): Json<UserProfile>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&state, &headers).await?;
    let profile = state.auth.save_profile(&user.id, profile).await?;
    Ok(Json(json!({ "profile": profile })))
}
