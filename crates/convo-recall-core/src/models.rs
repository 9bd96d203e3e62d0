//! Core data models used throughout convo-recall.
//!
//! An [`Exchange`] is the atomic indexed unit: one user turn paired with
//! the assistant turn that answered it, plus provenance pointing back into
//! the archived transcript it was parsed from.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One user turn and the assistant turn that closed it.
///
/// Exchanges are never mutated after creation. Re-indexing replaces the
/// stored record wholesale under the same [`id`](Exchange::id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    /// Deterministic id, see [`exchange_id`].
    pub id: String,
    /// Name of the project directory the transcript belongs to.
    pub project: String,
    /// ISO-8601 time of the exchange.
    pub timestamp: String,
    pub user_message: String,
    pub assistant_message: String,
    /// Path of the archived transcript copy this exchange was parsed from.
    pub archive_path: String,
    /// 1-based line of the user turn.
    pub line_start: i64,
    /// 1-based line of the assistant turn.
    pub line_end: i64,
}

/// Derive the stable exchange id from its provenance.
///
/// The id is the lowercase hex SHA-256 of `"{archive_path}:{start}-{end}"`.
/// Transcripts are append-only and archive copies are never rewritten, so
/// the same logical exchange always hashes to the same id.
pub fn exchange_id(archive_path: &str, line_start: i64, line_end: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}-{}", archive_path, line_start, line_end).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A ranked search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub exchange: Exchange,
    /// Raw distance reported by the store (smaller is closer).
    pub distance: f64,
    /// `1 - distance`.
    pub similarity: f64,
    /// First 200 characters of the user message.
    pub snippet: String,
}
