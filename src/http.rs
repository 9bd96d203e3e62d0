//! JSON POST with exponential backoff, shared by the embedding and
//! summarization clients.
//!
//! - HTTP 429 and 5xx → retry
//! - other 4xx → returned to the caller without retrying
//! - network errors (including timeouts) → retry
//! - backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, Result};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

/// A non-retryable response.
#[derive(Debug)]
pub struct ClientError {
    pub status: StatusCode,
    pub body: String,
}

/// Build a client with the given request timeout.
pub fn client(timeout_secs: u64) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Delay before retry `attempt` (1-based).
pub fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt.saturating_sub(1)).min(5))
}

/// POST `body` to `url`, retrying transient failures up to `max_retries`
/// times.
///
/// The outer `Result` fails when retries are exhausted; the inner one
/// carries a non-retryable client error for the caller to interpret.
pub async fn post_json(
    client: &Client,
    url: &str,
    headers: &[(&str, String)],
    body: &serde_json::Value,
    max_retries: u32,
    service: &str,
) -> Result<std::result::Result<serde_json::Value, ClientError>> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = backoff(attempt);
            debug!("{} retry {} after {:?}", service, attempt, delay);
            tokio::time::sleep(delay).await;
        }

        let mut request = client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(Ok(response.json().await?));
                }

                let body_text = response.text().await.unwrap_or_default();
                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    last_err = Some(anyhow!("{} API error {}: {}", service, status, body_text));
                    continue;
                }

                return Ok(Err(ClientError {
                    status,
                    body: body_text,
                }));
            }
            Err(e) => {
                last_err = Some(anyhow!("{} request to {} failed: {}", service, url, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("{} request failed after retries", service)))
}
