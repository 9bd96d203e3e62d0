//! Index verification and repair.
//!
//! Compares the archive copies, their summary files, the index records and
//! (while it exists) the live transcript behind each copy, and reports drift
//! in four independent categories:
//!
//! | Category | Condition | Repair |
//! |----------|-----------|--------|
//! | missing | archive copy with exchanges but no summary | summarize |
//! | orphaned | index records whose archive file is gone | delete records |
//! | outdated | parsed ids and stored ids for a transcript differ | reindex |
//! | corrupted | archive copy ≥ `corrupted_min_bytes` with zero exchanges | none |
//!
//! Healthy files and records are never touched.

use anyhow::{bail, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use convo_recall_core::store::{ArchivePathCount, ExchangeStore};

use crate::archive;
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::ingest::Indexer;
use crate::progress::NoProgress;
use crate::sqlite_store::SqliteStore;
use crate::summarizer::create_service;
use crate::transcripts;

/// An archived transcript whose parsed ids disagree with the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutdatedTranscript {
    pub archive_path: String,
    /// Parsed exchanges not in the store.
    pub unindexed: usize,
    /// Stored records the file no longer yields.
    pub stale: usize,
}

/// An archived transcript that is large but yields nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorruptedTranscript {
    pub archive_path: String,
    pub bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub missing: Vec<String>,
    pub orphaned: Vec<ArchivePathCount>,
    pub outdated: Vec<OutdatedTranscript>,
    pub corrupted: Vec<CorruptedTranscript>,
}

impl VerificationReport {
    pub fn issue_count(&self) -> usize {
        self.missing.len() + self.orphaned.len() + self.outdated.len() + self.corrupted.len()
    }

    pub fn is_healthy(&self) -> bool {
        self.issue_count() == 0
    }

    /// Issues `repair` can act on (everything but corrupted).
    pub fn repairable_count(&self) -> usize {
        self.missing.len() + self.orphaned.len() + self.outdated.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub summaries_written: u64,
    pub orphaned_records_deleted: u64,
    pub transcripts_reindexed: u64,
    pub failures: u64,
}

/// `<archive_root>/<project>/*.jsonl`, sorted.
fn archived_transcripts(archive_root: &Path) -> Result<Vec<PathBuf>> {
    if !archive_root.is_dir() {
        return Ok(Vec::new());
    }
    let mut paths = Vec::new();
    for entry in WalkDir::new(archive_root).min_depth(2).max_depth(2) {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == "jsonl")
        {
            paths.push(entry.path().to_path_buf());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Build a [`VerificationReport`] without modifying anything.
pub async fn verify_index(config: &Config, store: &dyn ExchangeStore) -> Result<VerificationReport> {
    let mut report = VerificationReport::default();

    for path in archived_transcripts(&config.paths.archive_root)? {
        let path_str = path.to_string_lossy().to_string();
        let project = transcripts::project_of(&path);
        let source = transcripts::current_transcript(&config.paths.transcript_root, &path);
        let exchanges = transcripts::parse_file(&source, &project, &path)?;

        if exchanges.is_empty() {
            let bytes = std::fs::metadata(&path)?.len();
            if bytes >= config.indexing.corrupted_min_bytes {
                report.corrupted.push(CorruptedTranscript {
                    archive_path: path_str,
                    bytes,
                });
            }
            continue;
        }

        if !archive::summary_path_for(&path).exists() {
            report.missing.push(path_str.clone());
        }

        let parsed: HashSet<String> = exchanges.into_iter().map(|e| e.id).collect();
        let stored = store.ids_for_archive(&path_str).await?;
        let unindexed = parsed.difference(&stored).count();
        let stale = stored.difference(&parsed).count();
        if unindexed > 0 || stale > 0 {
            report.outdated.push(OutdatedTranscript {
                archive_path: path_str,
                unindexed,
                stale,
            });
        }
    }

    for entry in store.archive_paths().await? {
        if !Path::new(&entry.archive_path).exists() {
            report.orphaned.push(entry);
        }
    }

    Ok(report)
}

/// Fix what `report` found. Corrupted transcripts are left alone.
pub async fn repair_index(
    report: &VerificationReport,
    indexer: &Indexer<'_>,
    store: &dyn ExchangeStore,
) -> Result<RepairReport> {
    let mut repair = RepairReport::default();

    for path in &report.missing {
        match indexer.summarize_archive(Path::new(path)).await {
            Ok(true) => {
                info!("summarized {}", path);
                repair.summaries_written += 1;
            }
            Ok(false) => {}
            Err(e) => {
                warn!("could not summarize {}: {:#}", path, e);
                repair.failures += 1;
            }
        }
    }

    for orphan in &report.orphaned {
        let deleted = store.delete_by_archive_path(&orphan.archive_path).await?;
        info!("removed {} orphaned records for {}", deleted, orphan.archive_path);
        repair.orphaned_records_deleted += deleted;
    }

    for outdated in &report.outdated {
        match indexer.reindex_archive(Path::new(&outdated.archive_path)).await {
            Ok(n) => {
                info!("reindexed {}: {} exchanges", outdated.archive_path, n);
                repair.transcripts_reindexed += 1;
            }
            Err(e) => {
                warn!("could not reindex {}: {:#}", outdated.archive_path, e);
                repair.failures += 1;
            }
        }
    }

    Ok(repair)
}

/// `recall verify`. Returns whether the index is healthy.
pub async fn run_verify(config: &Config, json: bool) -> Result<bool> {
    let store = SqliteStore::open(config).await?;
    let report = verify_index(config, &store).await;
    store.close().await;
    let report = report?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", format_report(&report));
    }
    Ok(report.is_healthy())
}

/// `recall repair`: verify, then fix everything repairable.
pub async fn run_repair(config: &Config) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let report = verify_index(config, &store).await?;

    if report.repairable_count() == 0 {
        println!("No issues to repair.");
        if !report.corrupted.is_empty() {
            println!(
                "{} corrupted files need manual inspection.",
                report.corrupted.len()
            );
        }
        store.close().await;
        return Ok(());
    }

    if !report.outdated.is_empty() && !config.embedding.is_enabled() {
        store.close().await;
        bail!(
            "Reindexing {} outdated transcripts requires an embedding provider; set [embedding] provider in the config",
            report.outdated.len()
        );
    }

    let embedder = create_embedder(&config.embedding)?;
    let summarizer = create_service(&config.summarizer)?;
    let progress = NoProgress;
    let indexer = Indexer::new(
        config,
        &store,
        embedder.as_ref(),
        summarizer.as_deref(),
        &progress,
    );
    let repair = repair_index(&report, &indexer, &store).await;
    store.close().await;
    let repair = repair?;

    println!("repair");
    println!("  summaries written: {}", repair.summaries_written);
    println!("  orphaned records deleted: {}", repair.orphaned_records_deleted);
    println!("  transcripts reindexed: {}", repair.transcripts_reindexed);
    println!("  failures: {}", repair.failures);
    if !report.corrupted.is_empty() {
        println!("  corrupted (untouched): {}", report.corrupted.len());
    }
    Ok(())
}

/// Render a report for the terminal.
pub fn format_report(report: &VerificationReport) -> String {
    let mut out = String::from("=== Verification Results ===\n");
    out.push_str(&format!("Missing summaries: {}\n", report.missing.len()));
    out.push_str(&format!("Orphaned entries: {}\n", report.orphaned.len()));
    out.push_str(&format!("Outdated files: {}\n", report.outdated.len()));
    out.push_str(&format!("Corrupted files: {}\n", report.corrupted.len()));

    if !report.missing.is_empty() {
        out.push_str("\nMissing summaries:\n");
        for path in &report.missing {
            out.push_str(&format!("  {}\n", path));
        }
    }
    if !report.orphaned.is_empty() {
        out.push_str("\nOrphaned entries:\n");
        for o in &report.orphaned {
            out.push_str(&format!("  {} ({} records)\n", o.archive_path, o.exchanges));
        }
    }
    if !report.outdated.is_empty() {
        out.push_str("\nOutdated files:\n");
        for o in &report.outdated {
            out.push_str(&format!(
                "  {} ({} unindexed, {} stale)\n",
                o.archive_path, o.unindexed, o.stale
            ));
        }
    }
    if !report.corrupted.is_empty() {
        out.push_str("\nCorrupted files:\n");
        for c in &report.corrupted {
            out.push_str(&format!("  {} ({} bytes)\n", c.archive_path, c.bytes));
        }
    }

    if report.is_healthy() {
        out.push_str("\nIndex is healthy.\n");
    } else if report.repairable_count() > 0 {
        out.push_str("\nRun `recall repair` to fix these issues.\n");
    }
    out
}
