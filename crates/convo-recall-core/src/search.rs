//! Nearest-neighbor search over indexed exchanges.
//!
//! Operates entirely through the [`ExchangeStore`] trait. The caller embeds
//! the query; this module asks the store for the `k` nearest records and
//! turns raw distances into ranked [`SearchHit`]s.

use anyhow::Result;

use crate::models::SearchHit;
use crate::store::{ExchangeCandidate, ExchangeStore};

/// Characters of the user message kept in a snippet.
pub const SNIPPET_CHARS: usize = 200;

/// Parameters for one search invocation.
#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    /// Pre-computed query embedding.
    pub query_vec: &'a [f32],
    /// Maximum results to return.
    pub limit: usize,
    /// Only return exchanges from this project.
    pub project: Option<&'a str>,
}

/// First [`SNIPPET_CHARS`] characters of `text`, with `...` when cut.
pub fn make_snippet(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(SNIPPET_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

impl From<ExchangeCandidate> for SearchHit {
    fn from(candidate: ExchangeCandidate) -> Self {
        let snippet = make_snippet(&candidate.exchange.user_message);
        SearchHit {
            similarity: 1.0 - candidate.distance,
            distance: candidate.distance,
            snippet,
            exchange: candidate.exchange,
        }
    }
}

/// Run a vector search, returning hits in non-decreasing distance order.
pub async fn search<S: ExchangeStore + ?Sized>(
    store: &S,
    req: &SearchRequest<'_>,
) -> Result<Vec<SearchHit>> {
    if req.limit == 0 {
        return Ok(Vec::new());
    }
    let candidates = store
        .vector_search(req.query_vec, req.limit, req.project)
        .await?;
    Ok(candidates.into_iter().map(SearchHit::from).collect())
}
