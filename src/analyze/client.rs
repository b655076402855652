//! HTTP client utilities for the completion API
//!
//! Client construction with explicit timeouts, header building and a send
//! loop with optional retry.

use std::time::{Duration, Instant};

use rand::{rngs::OsRng, RngCore};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Response,
};

use super::context::RetryConfig;
use super::request::ProviderRequest;
use crate::config::Settings;
use crate::error::{AppError, AppResult};

/// Create the HTTP client. Both timeouts are always set so a stalled
/// upstream cannot hold a request forever.
pub fn create_client(settings: &Settings) -> AppResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .build()
        .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Authorization, content type and the optional OpenRouter attribution headers.
pub fn build_headers(settings: &Settings) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Some(api_key) = settings.api_key.as_deref().filter(|k| !k.is_empty()) {
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", api_key)) {
            headers.insert(AUTHORIZATION, value);
        }
    }

    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let Some(referer) = settings.http_referer.as_deref() {
        if let Ok(value) = HeaderValue::from_str(referer) {
            headers.insert("http-referer", value);
        }
    }
    if let Some(title) = settings.app_title.as_deref() {
        if let Ok(value) = HeaderValue::from_str(title) {
            headers.insert("x-title", value);
        }
    }

    headers
}

/// Determine if an HTTP status code should trigger a retry
pub fn should_retry(status: u16) -> bool {
    matches!(status, 500 | 502 | 503 | 504 | 429)
}

/// Calculate delay with exponential backoff and jitter
pub fn calculate_retry_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base_delay = config.initial_delay_ms;
    let max_delay = config.max_delay_ms;

    let exp_delay = (1u64 << attempt.min(10)).saturating_mul(base_delay);
    let delay = exp_delay.min(max_delay);

    // Up to 25% jitter
    let mut jitter_bytes = [0u8; 8];
    OsRng.fill_bytes(&mut jitter_bytes);
    let jitter = u64::from_le_bytes(jitter_bytes) % (delay / 4 + 1);

    Duration::from_millis(delay + jitter)
}

/// Outcome of a single POST, before the status is inspected.
pub enum Attempt {
    Response(Response),
    Failed { message: String, retryable: bool },
}

/// Make a single POST request attempt
pub async fn make_request(
    client: &Client,
    url: &str,
    headers: HeaderMap,
    body: &ProviderRequest,
) -> Attempt {
    let start = Instant::now();

    crate::logger::debug("client", &format!("Sending request to: {}", url));

    match client.post(url).headers(headers).json(body).send().await {
        Ok(response) => {
            crate::logger::debug(
                "client",
                &format!(
                    "Response status: {} ({}ms)",
                    response.status(),
                    start.elapsed().as_millis()
                ),
            );
            Attempt::Response(response)
        }
        Err(e) => {
            crate::logger::error("client", &format!("Request failed: {}", e));
            let message = if e.is_timeout() {
                format!("Request timed out: {}", e)
            } else if e.is_connect() {
                format!("Connection failed: {}", e)
            } else {
                format!("Request error: {}", e)
            };
            Attempt::Failed {
                message,
                retryable: e.is_timeout() || e.is_connect(),
            }
        }
    }
}

/// POST the request, retrying transient failures up to `config.max_attempts`.
/// Returns the successful response or a provider error carrying the last
/// upstream detail.
pub async fn send_with_retry(
    client: &Client,
    url: &str,
    headers: HeaderMap,
    body: &ProviderRequest,
    config: &RetryConfig,
) -> AppResult<Response> {
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let is_last = attempt >= max_attempts;

        let last_error = match make_request(client, url, headers.clone(), body).await {
            Attempt::Response(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }
                let error_body = response.text().await.unwrap_or_default();
                let message = format!("Upstream returned {}: {}", status, error_body.trim());
                if !should_retry(status.as_u16()) || is_last {
                    return Err(AppError::Provider(message));
                }
                message
            }
            Attempt::Failed { message, retryable } => {
                if !retryable || is_last {
                    return Err(AppError::Provider(message));
                }
                message
            }
        };

        let delay = calculate_retry_delay(attempt, config);
        crate::logger::warn(
            "client",
            &format!(
                "Attempt {}/{} failed ({}), retrying in {}ms",
                attempt,
                max_attempts,
                last_error,
                delay.as_millis()
            ),
        );
        tokio::time::sleep(delay).await;
    }
}
