use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::handlers::{auth, config, health, history, ingest, rag, translate};
use crate::state::AppState;

/// Creates the application router with all routes and middleware.
///
/// - Health check
/// - Question answering (full book, selected text) and translation
/// - Ingestion and effective config (admin key)
/// - Auth, onboarding profile and chat logs (bearer token)
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state.settings.server.cors_allowed_origins);
    Router::new()
        .route("/health", get(health::health))
        .route("/api/rag/query", post(rag::query))
        .route("/api/rag/selected-text", post(rag::selected_text))
        .route("/api/translate", post(translate::translate))
        .route("/api/ingest", post(ingest::ingest))
        .route("/api/config", get(config::get_config))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/signin", post(auth::signin))
        .route("/api/auth/signout", post(auth::signout))
        .route("/api/auth/me", get(auth::me))
        .route(
            "/api/profile/onboarding",
            get(auth::get_profile).put(auth::put_profile),
        )
        .route("/api/sessions/:session_id/logs", get(history::session_logs))
        .with_state(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(configured: &[String]) -> CorsLayer {
    let allow_origin = match resolve_allowed_origins(configured) {
        AllowedOrigins::Any => AllowOrigin::any(),
        AllowedOrigins::List(origins) => AllowOrigin::list(
            origins
                .into_iter()
                .filter_map(|origin| HeaderValue::from_str(&origin).ok())
                .collect::<Vec<_>>(),
        ),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-api-key"),
        ])
}

#[derive(Debug, PartialEq)]
enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

fn resolve_allowed_origins(configured: &[String]) -> AllowedOrigins {
    let origins: Vec<String> = configured
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .map(|origin| origin.trim_end_matches('/').to_string())
        .collect();

    if origins.iter().any(|origin| origin == "*") {
        return AllowedOrigins::Any;
    }
    if origins.is_empty() {
        return AllowedOrigins::List(default_local_origins());
    }
    AllowedOrigins::List(origins)
}

fn default_local_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://localhost:8000".to_string(),
        "http://127.0.0.1:8000".to_string(),
    ]
}
