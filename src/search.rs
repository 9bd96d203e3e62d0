//! `recall search`: embed the query, rank stored exchanges, print.

use anyhow::Result;

use convo_recall_core::embedding::{embed_one, Embedder};
use convo_recall_core::models::SearchHit;
use convo_recall_core::search::{search, SearchRequest};
use convo_recall_core::store::ExchangeStore;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::sqlite_store::SqliteStore;

/// Embed `query` once and return the nearest exchanges.
pub async fn search_exchanges(
    store: &dyn ExchangeStore,
    embedder: &dyn Embedder,
    query: &str,
    limit: usize,
    project: Option<&str>,
) -> Result<Vec<SearchHit>> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }
    let query_vec = embed_one(embedder, query).await?;
    search(
        store,
        &SearchRequest {
            query_vec: &query_vec,
            limit,
            project,
        },
    )
    .await
}

/// `YYYY-MM-DD` of an RFC 3339 timestamp in UTC, or its first ten
/// characters when it does not parse.
fn utc_date(timestamp: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(timestamp) {
        Ok(ts) => ts.with_timezone(&chrono::Utc).format("%Y-%m-%d").to_string(),
        Err(_) => timestamp.get(..10).unwrap_or(timestamp).to_string(),
    }
}

/// Render hits the way the CLI prints them.
pub fn format_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "No results found.\n".to_string();
    }

    let mut out = format!("Found {} relevant conversations:\n\n", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        let ex = &hit.exchange;
        let date = utc_date(&ex.timestamp);
        out.push_str(&format!("{}. [{}, {}]\n", i + 1, ex.project, date));
        out.push_str(&format!("   \"{}\"\n", hit.snippet.replace('\n', " ").trim()));
        out.push_str(&format!(
            "   File: {}:{}-{}\n",
            ex.archive_path, ex.line_start, ex.line_end
        ));
        out.push_str(&format!("   Similarity: {:.1}%\n\n", hit.similarity * 100.0));
    }
    out
}

pub async fn run_search(
    config: &Config,
    query: &str,
    limit: Option<usize>,
    project: Option<&str>,
    json: bool,
) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let embedder = create_embedder(&config.embedding)?;
    let limit = limit.unwrap_or(config.retrieval.default_limit);

    let hits = search_exchanges(&store, embedder.as_ref(), query, limit, project).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else {
        print!("{}", format_hits(&hits));
    }

    store.close().await;
    Ok(())
}
