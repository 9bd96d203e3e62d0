//! Hierarchical conversation summarization.
//!
//! The control algorithm that turns an ordered list of exchanges into one
//! bounded-length summary. The language model itself is behind the
//! [`SummaryService`] trait; this module only decides what to ask it and
//! how to degrade when it fails.
//!
//! # Algorithm
//!
//! 1. Trivial conversations (no exchanges, or one tiny / no-op exchange)
//!    return [`TRIVIAL_SUMMARY`] without calling the service.
//! 2. Up to `direct_threshold` exchanges: one call over the whole
//!    conversation.
//! 3. Otherwise split into contiguous chunks of `chunk_size`, summarize each
//!    (failed chunks are dropped), then synthesize the chunk summaries into
//!    one paragraph. If every chunk fails the result is [`SUMMARY_ERROR`];
//!    if only the synthesis fails the chunk summaries are joined with spaces.
//!
//! # Escalation
//!
//! A [`ServiceError::ResourceExhausted`] at [`ModelTier::Standard`] is
//! retried once at [`ModelTier::Escalated`]. A second exhaustion is returned
//! to the caller as text, never escalated further.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::models::Exchange;
use crate::parser::format_conversation;

/// Returned for conversations with nothing worth summarizing.
pub const TRIVIAL_SUMMARY: &str = "Trivial conversation with no substantive content.";

/// Returned when every chunk of a long conversation failed to summarize.
pub const SUMMARY_ERROR: &str = "Error: Unable to summarize conversation.";

/// System prompt sent with every summarization request.
pub const SYSTEM_PROMPT: &str = "Write concise, factual summaries. Output ONLY the summary - no preamble, no \"Here is\", no \"I will\". Your output will be indexed directly.";

/// User messages that end a session without content.
const NOOP_COMMANDS: &[&str] = &["/exit", "/quit", "/clear"];

/// Conversations whose formatted text is shorter than this are trivial.
const MIN_CONVERSATION_CHARS: usize = 100;

const SUMMARY_OPEN: &str = "<summary>";
const SUMMARY_CLOSE: &str = "</summary>";

/// Capability selector for the summarization service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    /// The default, cheaper model.
    Standard,
    /// The higher-capability model used after resource exhaustion.
    Escalated,
}

/// Typed failure reported by a [`SummaryService`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    /// The model ran out of its reasoning/output budget. Escalating the
    /// tier may succeed.
    #[error("{0}")]
    ResourceExhausted(String),
    /// Any other failure (network, API error, timeout).
    #[error("summarization failed: {0}")]
    Failed(String),
}

/// A language model that condenses text.
#[async_trait]
pub trait SummaryService: Send + Sync {
    /// Complete `prompt` with the model selected by `tier`.
    async fn complete(&self, prompt: &str, tier: ModelTier) -> Result<String, ServiceError>;
}

/// Tuning knobs for [`summarize_conversation`].
#[derive(Debug, Clone, Copy)]
pub struct SummarizeOptions {
    /// Exchanges per chunk on the hierarchical path.
    pub chunk_size: usize,
    /// Largest exchange count summarized in a single call.
    pub direct_threshold: usize,
}

impl Default for SummarizeOptions {
    fn default() -> Self {
        Self {
            chunk_size: 8,
            direct_threshold: 15,
        }
    }
}

/// Call the service, escalating once on resource exhaustion.
pub async fn complete_with_escalation(
    service: &dyn SummaryService,
    prompt: &str,
) -> Result<String, ServiceError> {
    match service.complete(prompt, ModelTier::Standard).await {
        Err(ServiceError::ResourceExhausted(reason)) => {
            info!("standard model exhausted its budget ({}), escalating", reason);
            match service.complete(prompt, ModelTier::Escalated).await {
                Err(ServiceError::ResourceExhausted(text)) => Ok(text),
                other => other,
            }
        }
        other => other,
    }
}

/// Pull the text between `<summary>` tags, or return the trimmed response
/// unchanged when the tags are absent.
pub fn extract_summary(response: &str) -> String {
    if let Some(start) = response.find(SUMMARY_OPEN) {
        let body = &response[start + SUMMARY_OPEN.len()..];
        if let Some(end) = body.find(SUMMARY_CLOSE) {
            return body[..end].trim().to_string();
        }
    }
    response.trim().to_string()
}

/// Whether a conversation is too small to be worth a service call.
pub fn is_trivial(exchanges: &[Exchange]) -> bool {
    match exchanges {
        [] => true,
        [only] => {
            format_conversation(exchanges).chars().count() < MIN_CONVERSATION_CHARS
                || NOOP_COMMANDS.contains(&only.user_message.trim())
        }
        _ => false,
    }
}

/// Split exchanges into contiguous chunks; the last may be smaller.
pub fn chunk_exchanges(exchanges: &[Exchange], chunk_size: usize) -> Vec<&[Exchange]> {
    exchanges.chunks(chunk_size.max(1)).collect()
}

fn direct_prompt(conversation: &str) -> String {
    format!(
        "One paragraph summary (150 words max): what was requested, what was done, notable insights. \
         Wrap the paragraph in <summary></summary> tags. No preamble - output goes directly to index.\n\n{}",
        conversation
    )
}

fn chunk_prompt(conversation: &str) -> String {
    format!(
        "3-4 sentences summarizing this part, wrapped in <summary></summary> tags. No preamble.\n\n{}",
        conversation
    )
}

fn synthesis_prompt(chunk_summaries: &[String]) -> String {
    let parts = chunk_summaries
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "One paragraph (200 words max) synthesizing the goal, what was accomplished, and key challenges. \
         Wrap the paragraph in <summary></summary> tags. No preamble - output goes directly to index.\n\n\
         Part summaries:\n{}",
        parts
    )
}

/// Summarize a conversation.
///
/// Errors only on the direct path, when the single service call fails;
/// the hierarchical path always degrades to a non-empty string.
pub async fn summarize_conversation(
    service: &dyn SummaryService,
    exchanges: &[Exchange],
    options: &SummarizeOptions,
) -> Result<String> {
    if is_trivial(exchanges) {
        return Ok(TRIVIAL_SUMMARY.to_string());
    }

    if exchanges.len() <= options.direct_threshold {
        let prompt = direct_prompt(&format_conversation(exchanges));
        let response = complete_with_escalation(service, &prompt).await?;
        return Ok(extract_summary(&response));
    }

    let chunks = chunk_exchanges(exchanges, options.chunk_size);
    info!(
        "long conversation ({} exchanges): hierarchical summary over {} chunks",
        exchanges.len(),
        chunks.len()
    );

    let mut chunk_summaries = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        let prompt = chunk_prompt(&format_conversation(chunk));
        match complete_with_escalation(service, &prompt).await {
            Ok(response) => {
                let summary = extract_summary(&response);
                debug!(
                    "chunk {}/{}: {} words",
                    i + 1,
                    chunks.len(),
                    summary.split_whitespace().count()
                );
                chunk_summaries.push(summary);
            }
            Err(e) => warn!("chunk {}/{} failed, skipping: {}", i + 1, chunks.len(), e),
        }
    }

    if chunk_summaries.is_empty() {
        return Ok(SUMMARY_ERROR.to_string());
    }

    match complete_with_escalation(service, &synthesis_prompt(&chunk_summaries)).await {
        Ok(response) => Ok(extract_summary(&response)),
        Err(e) => {
            warn!("synthesis failed, using chunk summaries: {}", e);
            Ok(chunk_summaries.join(" "))
        }
    }
}
