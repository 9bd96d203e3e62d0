//! Summarization service clients.
//!
//! Implements [`SummaryService`] over two backends, selected by
//! `summarizer.provider`:
//!
//! | Provider | Endpoint | Standard / escalated model |
//! |----------|----------|----------------------------|
//! | `anthropic` | `POST /v1/messages` | `model` / `escalation_model` |
//! | `ollama` | `POST /api/generate` | `model` / `escalation_model` (or `model`) |
//!
//! `disabled` yields no service; the indexer then leaves summaries for a
//! later `index-cleanup` or `repair`.
//!
//! Transport failures are retried with backoff by [`crate::http`]. What
//! remains is classified into [`ServiceError::ResourceExhausted`] (the
//! model ran out of its token budget before producing text) or
//! [`ServiceError::Failed`].

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;

use convo_recall_core::summarize::{ModelTier, ServiceError, SummaryService, SYSTEM_PROMPT};

use crate::config::SummarizerConfig;
use crate::http;

const ANTHROPIC_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_ANTHROPIC_MODEL: &str = "claude-haiku-4-5";
const DEFAULT_ANTHROPIC_ESCALATION_MODEL: &str = "claude-sonnet-4-5";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

// ============ Anthropic ============

/// Client for the Anthropic Messages API. Requires `ANTHROPIC_API_KEY`.
pub struct AnthropicService {
    api_key: String,
    url: String,
    model: String,
    escalation_model: String,
    max_tokens: u32,
    max_retries: u32,
    client: reqwest::Client,
}

impl AnthropicService {
    pub fn new(config: &SummarizerConfig) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;
        Ok(Self {
            api_key,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| ANTHROPIC_URL.to_string()),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
            escalation_model: config
                .escalation_model
                .clone()
                .unwrap_or_else(|| DEFAULT_ANTHROPIC_ESCALATION_MODEL.to_string()),
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }

    fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Standard => &self.model,
            ModelTier::Escalated => &self.escalation_model,
        }
    }
}

#[async_trait]
impl SummaryService for AnthropicService {
    async fn complete(&self, prompt: &str, tier: ModelTier) -> Result<String, ServiceError> {
        let body = serde_json::json!({
            "model": self.model_for(tier),
            "max_tokens": self.max_tokens,
            "system": SYSTEM_PROMPT,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let headers = [
            ("x-api-key", self.api_key.clone()),
            ("anthropic-version", ANTHROPIC_VERSION.to_string()),
        ];
        let endpoint = format!("{}/v1/messages", self.url.trim_end_matches('/'));

        match http::post_json(
            &self.client,
            &endpoint,
            &headers,
            &body,
            self.max_retries,
            "Anthropic",
        )
        .await
        {
            Ok(Ok(json)) => anthropic_response_text(&json),
            Ok(Err(e)) => Err(classify_anthropic_error(e.status.as_u16(), &e.body)),
            Err(e) => Err(ServiceError::Failed(e.to_string())),
        }
    }
}

/// Join the text blocks of a Messages API response.
fn anthropic_response_text(json: &Value) -> Result<String, ServiceError> {
    let text = json
        .get("content")
        .and_then(|c| c.as_array())
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
                .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    if !text.trim().is_empty() {
        return Ok(text);
    }
    match json.get("stop_reason").and_then(|s| s.as_str()) {
        Some("max_tokens") => Err(ServiceError::ResourceExhausted(
            "API Error: max_tokens reached before any summary text".to_string(),
        )),
        other => Err(ServiceError::Failed(format!(
            "empty response (stop_reason: {})",
            other.unwrap_or("none")
        ))),
    }
}

/// Map a non-retryable API error body onto the service error taxonomy.
fn classify_anthropic_error(status: u16, body: &str) -> ServiceError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));
    let kind = error
        .and_then(|e| e.get("type"))
        .and_then(|t| t.as_str())
        .unwrap_or("");
    let message = error
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .unwrap_or(body);

    if kind == "invalid_request_error" && message.contains("budget_tokens") {
        ServiceError::ResourceExhausted(format!("API Error: {}", message))
    } else {
        ServiceError::Failed(format!("Anthropic API error {}: {}", status, message))
    }
}

// ============ Ollama ============

/// Client for a local Ollama instance's `/api/generate` endpoint.
pub struct OllamaService {
    url: String,
    model: String,
    escalation_model: String,
    max_tokens: u32,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaService {
    pub fn new(config: &SummarizerConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("summarizer.model required for Ollama provider"))?;
        Ok(Self {
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            escalation_model: config
                .escalation_model
                .clone()
                .unwrap_or_else(|| model.clone()),
            model,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl SummaryService for OllamaService {
    async fn complete(&self, prompt: &str, tier: ModelTier) -> Result<String, ServiceError> {
        let model = match tier {
            ModelTier::Standard => &self.model,
            ModelTier::Escalated => &self.escalation_model,
        };
        let body = serde_json::json!({
            "model": model,
            "system": SYSTEM_PROMPT,
            "prompt": prompt,
            "stream": false,
            "options": { "num_predict": self.max_tokens },
        });
        let endpoint = format!("{}/api/generate", self.url.trim_end_matches('/'));

        match http::post_json(&self.client, &endpoint, &[], &body, self.max_retries, "Ollama")
            .await
        {
            Ok(Ok(json)) => ollama_response_text(&json),
            Ok(Err(e)) => Err(ServiceError::Failed(format!(
                "Ollama API error {}: {}",
                e.status, e.body
            ))),
            Err(e) => Err(ServiceError::Failed(e.to_string())),
        }
    }
}

fn ollama_response_text(json: &Value) -> Result<String, ServiceError> {
    let text = json
        .get("response")
        .and_then(|r| r.as_str())
        .unwrap_or_default();
    if !text.trim().is_empty() {
        return Ok(text.to_string());
    }
    match json.get("done_reason").and_then(|d| d.as_str()) {
        Some("length") => Err(ServiceError::ResourceExhausted(
            "API Error: generation hit num_predict before any summary text".to_string(),
        )),
        _ => Err(ServiceError::Failed("empty response from Ollama".to_string())),
    }
}

/// Build the configured summarization service, or `None` when disabled.
pub fn create_service(config: &SummarizerConfig) -> Result<Option<Box<dyn SummaryService>>> {
    match config.provider.as_str() {
        "disabled" => Ok(None),
        "anthropic" => Ok(Some(Box::new(AnthropicService::new(config)?))),
        "ollama" => Ok(Some(Box::new(OllamaService::new(config)?))),
        other => Err(anyhow!("Unknown summarizer provider: {}", other)),
    }
}
