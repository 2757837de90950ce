//! Shared JSON-over-HTTP plumbing for the hosted model backends.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::provider::ProviderError;

#[derive(Clone)]
pub struct JsonClient {
    backend: &'static str,
    client: Client,
    base_url: String,
    max_retries: usize,
}

impl JsonClient {
    pub fn new(
        backend: &'static str,
        base_url: &str,
        headers: HeaderMap,
        timeout: Duration,
        max_retries: usize,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            backend,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
        })
    }

    pub fn backend(&self) -> &'static str {
        self.backend
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// POSTs `body` to `path`, retrying throttling, server errors and
    /// connection failures with exponential backoff.
    pub async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, ProviderError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        let mut attempt = 0usize;
        loop {
            match self.client.post(&url).json(body).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let text = resp.text().await?;
                        return serde_json::from_str(&text).map_err(|e| ProviderError::Decode {
                            backend: self.backend,
                            message: e.to_string(),
                        });
                    }

                    let body = resp
                        .text()
                        .await
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt < self.max_retries {
                        attempt += 1;
                        tracing::debug!(
                            "{} returned {}, retrying (attempt {})",
                            self.backend,
                            status,
                            attempt
                        );
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(ProviderError::Status {
                        backend: self.backend,
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(err) => {
                    if is_retryable_error(&err) && attempt < self.max_retries {
                        attempt += 1;
                        tracing::debug!("{} request failed, retrying: {}", self.backend, err);
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }
    }
}

pub fn bearer_headers(api_key: &str) -> Result<HeaderMap, ProviderError> {
    let mut headers = json_headers();
    headers.insert(
        AUTHORIZATION,
        header_value(&format!("Bearer {}", api_key.trim()))?,
    );
    Ok(headers)
}

pub fn key_headers(name: &'static str, api_key: &str) -> Result<HeaderMap, ProviderError> {
    let mut headers = json_headers();
    headers.insert(HeaderName::from_static(name), header_value(api_key.trim())?);
    Ok(headers)
}

pub fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers
}

fn header_value(raw: &str) -> Result<HeaderValue, ProviderError> {
    HeaderValue::from_str(raw)
        .map_err(|_| ProviderError::InvalidConfig("API key contains invalid header characters".to_string()))
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(250 * (1 << capped))
}
