use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::paths::AppPaths;
use super::settings::AppConfig;
use super::validation::validate_config;
use crate::core::errors::ApiError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 10] = [
    "api_key",
    "admin_key",
    "secret",
    "password",
    "_token",
    "token_",
    "credential",
    "private_key",
    "access_key",
    "bearer",
];

const SENSITIVE_WHITELIST: [&str; 3] = ["max_tokens", "total_tokens", "tokens"];

/// Environment variables that override config values, as `(variable, path)`.
const ENV_OVERRIDES: [(&str, &[&str]); 15] = [
    ("OPENAI_API_KEY", &["providers", "openai", "api_key"]),
    ("COHERE_API_KEY", &["providers", "cohere", "api_key"]),
    ("QWEN_API_KEY", &["providers", "dashscope", "api_key"]),
    ("DASHSCOPE_API_KEY", &["providers", "dashscope", "api_key"]),
    ("LLM_MODEL", &["providers", "openai", "chat_model"]),
    ("COHERE_MODEL", &["providers", "cohere", "chat_model"]),
    ("COHERE_EMBEDDING_MODEL", &["providers", "cohere", "embedding_model"]),
    ("PROVIDER_TYPE", &["providers", "kind"]),
    ("QDRANT_URL", &["vector_store", "url"]),
    ("QDRANT_API_KEY", &["vector_store", "api_key"]),
    ("BOOKRAG_ADMIN_KEY", &["server", "admin_key"]),
    ("CHUNK_SIZE", &["chunking", "chunk_size"]),
    ("OVERLAP_SIZE", &["chunking", "chunk_overlap"]),
    ("TOP_K_RESULTS", &["retrieval", "top_k"]),
    ("PORT", &["server", "port"]),
];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
    config_override: Option<PathBuf>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self {
            paths,
            config_override: None,
        }
    }

    /// Reads `config.yml` from `path` instead of the discovered location.
    pub fn with_config_path(paths: Arc<AppPaths>, path: PathBuf) -> Self {
        Self {
            paths,
            config_override: Some(path),
        }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn config_path(&self) -> PathBuf {
        if let Some(path) = &self.config_override {
            return path.clone();
        }
        if let Ok(path) = env::var("BOOKRAG_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.paths.user_data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.paths.project_root.join("config.yml")
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.secrets_path.clone()
    }

    /// Defaults, `config.yml`, `secrets.yaml` and environment overrides, merged in that order.
    pub fn load_raw(&self) -> Value {
        let defaults = serde_json::to_value(AppConfig::default()).unwrap_or(Value::Null);
        let public_config = load_yaml_file(&self.config_path());
        let secrets_config = load_yaml_file(&self.secrets_path());
        let mut merged = deep_merge(&deep_merge(&defaults, &public_config), &secrets_config);
        apply_env_overrides(&mut merged, |name| env::var(name).ok());
        merged
    }

    pub fn load_config(&self) -> Result<AppConfig, ApiError> {
        parse_config(self.load_raw())
    }

    pub fn redact_sensitive_values(&self, value: &Value) -> Value {
        redact_sensitive_values(value)
    }
}

pub(crate) fn parse_config(raw: Value) -> Result<AppConfig, ApiError> {
    let config: AppConfig = serde_json::from_value(raw)
        .map_err(|e| ApiError::BadRequest(format!("Invalid configuration: {}", e)))?;
    validate_config(&config)?;
    Ok(config)
}

fn load_yaml_file(path: &Path) -> Value {
    if !path.exists() {
        return Value::Object(Map::new());
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<Value>(&contents) {
            Ok(value @ Value::Object(_)) => value,
            Ok(_) => Value::Object(Map::new()),
            Err(err) => {
                tracing::warn!("Ignoring unparsable config file {}: {}", path.display(), err);
                Value::Object(Map::new())
            }
        },
        Err(_) => Value::Object(Map::new()),
    }
}

fn apply_env_overrides<F>(config: &mut Value, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    for (name, path) in ENV_OVERRIDES {
        let Some(raw) = lookup(name).filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        let value = match raw.trim().parse::<u64>() {
            Ok(number) if !is_sensitive_key(path[path.len() - 1]) => Value::from(number),
            _ => Value::String(raw.trim().to_string()),
        };
        ensure_object_path(config, path, value);
    }
}

fn ensure_object_path(config: &mut Value, path: &[&str], value: Value) {
    if path.is_empty() {
        return;
    }

    let mut current = config;
    for (index, key) in path.iter().enumerate() {
        if index == path.len() - 1 {
            if let Some(map) = current.as_object_mut() {
                map.insert(key.to_string(), value);
            }
            return;
        }

        if !current.get(*key).map(|v| v.is_object()).unwrap_or(false) {
            let Some(map) = current.as_object_mut() else {
                return;
            };
            map.insert((*key).to_string(), Value::Object(Map::new()));
        }

        let Some(next) = current.get_mut(*key) else {
            return;
        };
        current = next;
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}
