use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

use crate::core::errors::ApiError;

const API_KEY_HEADER: &str = "x-api-key";
const BEARER_PREFIX: &str = "Bearer ";

/// Admin credential guarding ingestion and config endpoints.
#[derive(Clone)]
pub struct AdminKey {
    value: Option<String>,
}

impl AdminKey {
    pub fn new(value: Option<String>) -> Self {
        let value = value.filter(|v| !v.trim().is_empty());
        if value.is_none() {
            tracing::warn!("No admin key configured; admin endpoints are disabled");
        }
        Self { value }
    }

    pub fn is_configured(&self) -> bool {
        self.value.is_some()
    }
}

impl std::fmt::Debug for AdminKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminKey")
            .field("configured", &self.value.is_some())
            .finish()
    }
}

pub fn constant_time_eq(left: &str, right: &str) -> bool {
    left.as_bytes().ct_eq(right.as_bytes()).into()
}

pub fn require_api_key(headers: &HeaderMap, expected: &AdminKey) -> Result<(), ApiError> {
    let Some(expected) = expected.value.as_deref() else {
        return Err(ApiError::Forbidden);
    };

    let header_value = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if header_value.is_empty() {
        return Err(ApiError::Unauthorized);
    }

    if !constant_time_eq(header_value, expected) {
        return Err(ApiError::Unauthorized);
    }

    Ok(())
}

/// Extracts the bearer token from `Authorization`, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
}
