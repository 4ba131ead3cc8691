//! Shared HTTP plumbing for backend adapters: JSON POST with retry on 429/5xx.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::llm_client::LlmError;

/// Error bodies are clipped to this many bytes before they reach an error value.
const ERROR_BODY_LIMIT: usize = 500;

pub(crate) struct PostTarget<'a> {
    pub url: &'a str,
    pub bearer: Option<&'a str>,
    /// `None` leaves only the client's connect timeout in force (streaming).
    pub timeout: Option<Duration>,
    pub max_retries: u32,
}

/// Builds the shared reqwest client. Per-request timeouts are applied in `post_json`.
pub(crate) fn build_client(connect_timeout: Duration) -> Result<Client, LlmError> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .build()
        .map_err(LlmError::BackendUnreachable)
}

/// Posts `body` as JSON and returns the first successful response.
/// Retries on 429 (rate limit) and 5xx with exponential backoff: 1s, 2s, 4s...
pub(crate) async fn post_json<B: Serialize + ?Sized>(
    client: &Client,
    target: &PostTarget<'_>,
    body: &B,
) -> Result<Response, LlmError> {
    let mut last_error: Option<LlmError> = None;

    for attempt in 0..=target.max_retries {
        if attempt > 0 {
            let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
            warn!(
                "Model call attempt {} failed, retrying after {}ms...",
                attempt,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }

        let mut builder = client
            .post(target.url)
            .header("content-type", "application/json")
            .json(body);
        if let Some(token) = target.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(timeout) = target.timeout {
            builder = builder.timeout(timeout);
        }

        let response = match builder.send().await {
            Ok(r) => r,
            Err(e) => {
                last_error = Some(LlmError::BackendUnreachable(e));
                continue;
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let error = LlmError::BackendError {
            status: status.as_u16(),
            body: error_snippet(&body),
        };

        if status.as_u16() == 429 || status.is_server_error() {
            warn!("Model backend returned {}: {}", status, error_snippet(&body));
            last_error = Some(error);
            continue;
        }

        return Err(error);
    }

    Err(last_error.unwrap_or_else(|| LlmError::BackendError {
        status: 0,
        body: "no attempt was made".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorEnvelope {
    Nested { error: NestedError },
    Flat { error: String },
}

#[derive(Debug, Deserialize)]
struct NestedError {
    message: String,
}

/// Pulls the error message out of a JSON error body when possible, otherwise clips the raw body.
pub(crate) fn error_snippet(body: &str) -> String {
    let message = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope::Nested { error }) => error.message,
        Ok(ErrorEnvelope::Flat { error }) => error,
        Err(_) => body.trim().to_string(),
    };
    clip_bytes(&message, ERROR_BODY_LIMIT)
}

fn clip_bytes(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
