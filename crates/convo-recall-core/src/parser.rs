//! Transcript parser.
//!
//! Turns the newline-delimited JSON records of one transcript into an
//! ordered list of [`Exchange`]s. Parsing never fails: a line that is not
//! valid JSON, lacks a `message`, or is not a `user`/`assistant` record is
//! skipped and scanning continues.
//!
//! # Pairing
//!
//! The parser keeps a single pending-user slot:
//!
//! - a user turn overwrites whatever user turn is pending, so in
//!   `[user(A), user(B), assistant(C)]` only `B`/`C` become an exchange;
//! - an assistant turn with no pending user turn is dropped;
//! - emitting an exchange clears the slot;
//! - a user turn still pending at end of input is dropped.

use chrono::{SecondsFormat, Utc};
use serde::Deserialize;

use crate::models::{exchange_id, Exchange};

#[derive(Debug, Deserialize)]
struct TranscriptRecord {
    #[serde(rename = "type")]
    kind: String,
    message: Option<RecordMessage>,
    timestamp: Option<String>,
    #[allow(dead_code)]
    uuid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecordMessage {
    role: String,
    #[serde(default)]
    content: MessageContent,
}

/// Missing, `null` or otherwise unrecognised content reads as empty text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
    Other(serde_json::Value),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Other(serde_json::Value::Null)
    }
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    text: Option<String>,
}

impl MessageContent {
    /// Concatenate text blocks with `\n`, dropping everything else.
    fn into_text(self) -> String {
        match self {
            MessageContent::Text(text) => text,
            MessageContent::Blocks(blocks) => blocks
                .into_iter()
                .filter(|b| b.kind.as_deref() == Some("text"))
                .filter_map(|b| b.text.filter(|t| !t.is_empty()))
                .collect::<Vec<_>>()
                .join("\n"),
            MessageContent::Other(_) => String::new(),
        }
    }
}

struct PendingUser {
    message: String,
    line: i64,
}

/// Parse transcript text into exchanges.
///
/// `archive_path` is stamped on every exchange and feeds its id, so it must
/// be the path of the archive copy, not the live source.
pub fn parse_transcript(text: &str, project: &str, archive_path: &str) -> Vec<Exchange> {
    let mut exchanges = Vec::new();
    let mut pending: Option<PendingUser> = None;

    for (idx, line) in text.lines().enumerate() {
        let line_number = idx as i64 + 1;

        let record: TranscriptRecord = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(_) => continue,
        };

        if record.kind != "user" && record.kind != "assistant" {
            continue;
        }

        let message = match record.message {
            Some(m) => m,
            None => continue,
        };

        let role = message.role;
        let text = message.content.into_text();

        match role.as_str() {
            "user" => {
                pending = Some(PendingUser {
                    message: text,
                    line: line_number,
                });
            }
            "assistant" => {
                if let Some(user) = pending.take() {
                    exchanges.push(Exchange {
                        id: exchange_id(archive_path, user.line, line_number),
                        project: project.to_string(),
                        timestamp: record.timestamp.unwrap_or_else(now_iso),
                        user_message: user.message,
                        assistant_message: text,
                        archive_path: archive_path.to_string(),
                        line_start: user.line,
                        line_end: line_number,
                    });
                }
            }
            _ => {}
        }
    }

    exchanges
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Render exchanges as the plain-text conversation sent to the summarizer.
///
/// Each exchange becomes `User: …\n\nAgent: …`; exchanges are separated by
/// a `---` rule.
pub fn format_conversation(exchanges: &[Exchange]) -> String {
    exchanges
        .iter()
        .map(|ex| format!("User: {}\n\nAgent: {}", ex.user_message, ex.assistant_message))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
