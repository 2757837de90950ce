use super::settings::AppConfig;
use crate::core::errors::ApiError;

pub fn validate_config(config: &AppConfig) -> Result<(), ApiError> {
    let chunking = &config.chunking;
    validate_range("chunking.chunk_size", chunking.chunk_size as u64, 1, 100_000)?;
    if chunking.chunk_overlap >= chunking.chunk_size {
        return Err(config_error(format!(
            "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
            chunking.chunk_overlap, chunking.chunk_size
        )));
    }

    validate_range("retrieval.top_k", config.retrieval.top_k as u64, 1, 100)?;
    if !(-1.0..=1.0).contains(&config.retrieval.min_score) {
        return Err(config_error(
            "retrieval.min_score must be between -1.0 and 1.0".to_string(),
        ));
    }

    let providers = &config.providers;
    validate_range("providers.timeout_secs", providers.timeout_secs, 1, 600)?;
    validate_range("providers.max_retries", providers.max_retries as u64, 0, 10)?;
    validate_range("providers.max_tokens", providers.max_tokens as u64, 1, 32_000)?;
    if !(0.0..=2.0).contains(&providers.temperature) {
        return Err(config_error(
            "providers.temperature must be between 0.0 and 2.0".to_string(),
        ));
    }
    for (name, backend) in [
        ("openai", &providers.openai),
        ("cohere", &providers.cohere),
        ("dashscope", &providers.dashscope),
    ] {
        validate_url(&format!("providers.{}.base_url", name), &backend.base_url)?;
        validate_range(
            &format!("providers.{}.embedding_dimension", name),
            backend.embedding_dimension as u64,
            1,
            65_536,
        )?;
    }

    validate_url("vector_store.url", &config.vector_store.url)?;
    if config.vector_store.collection.trim().is_empty() {
        return Err(config_error(
            "vector_store.collection must not be empty".to_string(),
        ));
    }

    if config.ingest.extensions.is_empty() {
        return Err(config_error(
            "ingest.extensions must list at least one extension".to_string(),
        ));
    }

    validate_range(
        "auth.session_expiry_hours",
        config.auth.session_expiry_hours.max(0) as u64,
        1,
        24 * 365,
    )?;

    Ok(())
}

fn validate_range(path: &str, value: u64, min: u64, max: u64) -> Result<(), ApiError> {
    if value < min || value > max {
        return Err(config_error(format!(
            "{} must be between {} and {} (got {})",
            path, min, max, value
        )));
    }
    Ok(())
}

fn validate_url(path: &str, value: &str) -> Result<(), ApiError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        return Ok(());
    }
    Err(config_error(format!("{} must be an http(s) URL", path)))
}

fn config_error(message: String) -> ApiError {
    ApiError::BadRequest(format!("Invalid configuration: {}", message))
}
