//! `recall recent`: newest indexed exchanges first.

use anyhow::Result;

use convo_recall_core::models::Exchange;
use convo_recall_core::search::make_snippet;
use convo_recall_core::store::ExchangeStore;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

pub fn format_recent(exchanges: &[Exchange]) -> String {
    if exchanges.is_empty() {
        return "No indexed conversations.\n".to_string();
    }
    let mut out = String::new();
    for ex in exchanges {
        out.push_str(&format!("{}  [{}]\n", ex.timestamp, ex.project));
        out.push_str(&format!(
            "   \"{}\"\n",
            make_snippet(&ex.user_message).replace('\n', " ").trim()
        ));
        out.push_str(&format!(
            "   File: {}:{}-{}\n\n",
            ex.archive_path, ex.line_start, ex.line_end
        ));
    }
    out
}

pub async fn run_recent(
    config: &Config,
    project: Option<&str>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let limit = limit.unwrap_or(config.retrieval.default_limit);
    let exchanges = store.recent(project, limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&exchanges)?);
    } else {
        print!("{}", format_recent(&exchanges));
    }

    store.close().await;
    Ok(())
}
