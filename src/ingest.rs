//! Indexing pipeline orchestration.
//!
//! For each transcript: archive → parse the live transcript → summarize
//! (once) → embed new exchanges → store. Every step is idempotent:
//!
//! - the archive copy is never overwritten; exchanges are stamped with its
//!   path, and since transcripts only grow, their lines stay valid in it;
//! - an existing summary file means "already summarized";
//! - exchanges whose id is already stored are not re-embedded.
//!
//! A second run over an unchanged tree therefore makes no summarization and
//! no embedding calls. Summarization failures are logged and never abort a
//! run; an embedding failure abandons the current transcript only. Store
//! errors abort the run.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use convo_recall_core::embedding::{exchange_embedding_text, Embedder};
use convo_recall_core::models::Exchange;
use convo_recall_core::store::ExchangeStore;
use convo_recall_core::summarize::{summarize_conversation, SummarizeOptions, SummaryService};

use crate::archive::{self, ArchiveOutcome};
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::progress::{IndexProgressEvent, IndexProgressReporter};
use crate::sqlite_store::SqliteStore;
use crate::summarizer::create_service;
use crate::transcripts::{self, TranscriptFile};
use crate::{db, migrate};

/// Texts per embedding request.
const EMBED_BATCH: usize = 32;

/// Which transcripts a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexScope {
    /// Every non-excluded project.
    All,
    /// One project directory.
    Project(String),
    /// The transcript whose file name contains this session id.
    Session(String),
    /// Transcripts whose archive copy has no summary yet.
    Unprocessed,
}

/// One unit of indexing work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptJob {
    pub transcript: TranscriptFile,
    pub archive_path: PathBuf,
}

/// What processing one transcript did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptOutcome {
    pub archived: bool,
    pub exchanges: usize,
    pub summary_written: bool,
    pub summary_failed: bool,
    pub embedded: usize,
    pub already_indexed: usize,
    /// Set when the transcript was abandoned part-way.
    pub error: Option<String>,
}

impl TranscriptOutcome {
    /// Whether the run changed anything on disk or in the store.
    pub fn did_work(&self) -> bool {
        self.archived || self.summary_written || self.embedded > 0
    }
}

/// Counters for one indexing run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub transcripts_seen: u64,
    pub transcripts_processed: u64,
    pub archived: u64,
    pub skipped_empty: u64,
    pub summaries_written: u64,
    pub summaries_failed: u64,
    pub exchanges_embedded: u64,
    pub exchanges_already_indexed: u64,
    pub transcripts_failed: u64,
}

impl IndexStats {
    fn record(&mut self, outcome: &TranscriptOutcome) {
        self.transcripts_seen += 1;
        if outcome.did_work() {
            self.transcripts_processed += 1;
        }
        if outcome.archived {
            self.archived += 1;
        }
        if outcome.exchanges == 0 && outcome.error.is_none() {
            self.skipped_empty += 1;
        }
        if outcome.summary_written {
            self.summaries_written += 1;
        }
        if outcome.summary_failed {
            self.summaries_failed += 1;
        }
        if outcome.error.is_some() {
            self.transcripts_failed += 1;
        }
        self.exchanges_embedded += outcome.embedded as u64;
        self.exchanges_already_indexed += outcome.already_indexed as u64;
    }
}

/// Drives archive, summary and embedding work against a store.
pub struct Indexer<'a> {
    config: &'a Config,
    store: &'a dyn ExchangeStore,
    embedder: &'a dyn Embedder,
    summarizer: Option<&'a dyn SummaryService>,
    progress: &'a dyn IndexProgressReporter,
}

impl<'a> Indexer<'a> {
    pub fn new(
        config: &'a Config,
        store: &'a dyn ExchangeStore,
        embedder: &'a dyn Embedder,
        summarizer: Option<&'a dyn SummaryService>,
        progress: &'a dyn IndexProgressReporter,
    ) -> Self {
        Self {
            config,
            store,
            embedder,
            summarizer,
            progress,
        }
    }

    fn summarize_options(&self) -> SummarizeOptions {
        SummarizeOptions {
            chunk_size: self.config.indexing.chunk_size,
            direct_threshold: self.config.indexing.direct_summary_threshold,
        }
    }

    fn job_for(&self, transcript: TranscriptFile) -> TranscriptJob {
        let archive_path = archive::archive_path_for(
            &self.config.paths.archive_root,
            &transcript.project,
            &transcript.file_name,
        );
        TranscriptJob {
            transcript,
            archive_path,
        }
    }

    /// List the transcripts `scope` covers, in processing order.
    pub fn discover(&self, scope: &IndexScope) -> Result<Vec<TranscriptJob>> {
        let root = &self.config.paths.transcript_root;
        let excluded = transcripts::build_exclusions(&self.config.indexing.excluded_projects)?;

        let files = match scope {
            IndexScope::All | IndexScope::Unprocessed => transcripts::discover(root, &excluded)?,
            IndexScope::Project(project) => {
                if transcripts::list_projects(root, &excluded)?.contains(project) {
                    transcripts::list_transcripts(root, project)?
                } else {
                    warn!("project {} not found or excluded", project);
                    Vec::new()
                }
            }
            IndexScope::Session(session_id) => {
                transcripts::find_session(root, &excluded, session_id)?
                    .into_iter()
                    .collect()
            }
        };

        let mut jobs: Vec<TranscriptJob> = files.into_iter().map(|f| self.job_for(f)).collect();
        if *scope == IndexScope::Unprocessed {
            jobs.retain(|job| !archive::summary_path_for(&job.archive_path).exists());
        }
        Ok(jobs)
    }

    /// Run every job in `scope`, stopping once `limit` transcripts have had
    /// work done on them.
    pub async fn run(&self, scope: &IndexScope, limit: Option<usize>) -> Result<IndexStats> {
        self.progress.report(IndexProgressEvent::Discovering);
        let jobs = self.discover(scope)?;
        let total = jobs.len() as u64;
        let mut stats = IndexStats::default();

        for (i, job) in jobs.iter().enumerate() {
            if limit.is_some_and(|cap| stats.transcripts_processed as usize >= cap) {
                info!("reached limit of {} transcripts", stats.transcripts_processed);
                break;
            }
            self.progress.report(IndexProgressEvent::Processing {
                n: i as u64 + 1,
                total,
                project: job.transcript.project.clone(),
                file: job.transcript.file_name.clone(),
            });
            let outcome = self.process(job).await?;
            stats.record(&outcome);
        }

        self.progress.report(IndexProgressEvent::Done {
            processed: stats.transcripts_processed,
            exchanges: stats.exchanges_embedded,
        });
        Ok(stats)
    }

    /// Archive, summarize and embed one transcript.
    ///
    /// Per-transcript failures (unreadable file, embedding error) come back
    /// in [`TranscriptOutcome::error`]; an `Err` means the store failed.
    pub async fn process(&self, job: &TranscriptJob) -> Result<TranscriptOutcome> {
        let mut outcome = TranscriptOutcome::default();
        let name = &job.transcript.file_name;

        match archive::archive_transcript(&job.transcript.path, &job.archive_path) {
            Ok(ArchiveOutcome::Copied) => {
                info!("archived {}/{}", job.transcript.project, name);
                outcome.archived = true;
            }
            Ok(ArchiveOutcome::AlreadyArchived) => {}
            Err(e) => {
                warn!("{:#}", e);
                outcome.error = Some(format!("{:#}", e));
                return Ok(outcome);
            }
        }

        // The live file may have grown since it was archived. Records still
        // name the archive copy as their provenance.
        let parsed = transcripts::parse_file(
            &job.transcript.path,
            &job.transcript.project,
            &job.archive_path,
        );
        let exchanges = match parsed {
            Ok(exchanges) => exchanges,
            Err(e) => {
                warn!("{:#}", e);
                outcome.error = Some(format!("{:#}", e));
                return Ok(outcome);
            }
        };
        outcome.exchanges = exchanges.len();
        if exchanges.is_empty() {
            debug!("skipped {} (no exchanges)", name);
            return Ok(outcome);
        }

        if !archive::summary_path_for(&job.archive_path).exists() {
            match self.write_summary(&job.archive_path, &exchanges).await {
                Ok(true) => outcome.summary_written = true,
                Ok(false) => {}
                Err(e) => {
                    warn!("summary failed for {}: {:#}", name, e);
                    outcome.summary_failed = true;
                }
            }
        }

        let ids: Vec<String> = exchanges.iter().map(|e| e.id.clone()).collect();
        let existing = self.store.existing_ids(&ids).await?;
        let fresh: Vec<&Exchange> = exchanges
            .iter()
            .filter(|e| !existing.contains(&e.id))
            .collect();
        outcome.already_indexed = exchanges.len() - fresh.len();

        match self.embed_and_store(&fresh).await? {
            Ok(n) => outcome.embedded = n,
            Err((n, e)) => {
                warn!("embedding failed for {}: {:#}", name, e);
                outcome.embedded = n;
                outcome.error = Some(format!("{:#}", e));
            }
        }

        if outcome.embedded > 0 {
            info!("indexed {}: {} new exchanges", name, outcome.embedded);
        }
        Ok(outcome)
    }

    /// Summarize and persist. `Ok(false)` when no service is configured.
    async fn write_summary(&self, archive_path: &Path, exchanges: &[Exchange]) -> Result<bool> {
        let service = match self.summarizer {
            Some(service) => service,
            None => {
                debug!("summarizer disabled, leaving {} unsummarized", archive_path.display());
                return Ok(false);
            }
        };
        let summary = summarize_conversation(service, exchanges, &self.summarize_options()).await?;
        archive::write_summary(archive_path, &summary)?;
        info!("summary: {} words", summary.split_whitespace().count());
        Ok(true)
    }

    /// Embed and upsert `exchanges` in batches.
    ///
    /// The inner error carries how many were stored before the embedder
    /// failed; the outer error is a store failure.
    async fn embed_and_store(
        &self,
        exchanges: &[&Exchange],
    ) -> Result<std::result::Result<usize, (usize, anyhow::Error)>> {
        let mut stored = 0;
        for batch in exchanges.chunks(EMBED_BATCH) {
            let vectors = match self.embed_batch(batch).await {
                Ok(v) => v,
                Err(e) => return Ok(Err((stored, e))),
            };
            for (exchange, vector) in batch.iter().zip(vectors.iter()) {
                self.store.upsert_exchange(exchange, vector).await?;
                stored += 1;
            }
        }
        Ok(Ok(stored))
    }

    async fn embed_batch(&self, batch: &[&Exchange]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = batch.iter().map(|e| exchange_embedding_text(e)).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != batch.len() {
            anyhow::bail!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            );
        }
        Ok(vectors)
    }

    /// Summarize an archived transcript that has no summary. Returns
    /// `false` when it parses to nothing.
    pub async fn summarize_archive(&self, archive_path: &Path) -> Result<bool> {
        let exchanges = self.parse_archived(archive_path)?;
        if exchanges.is_empty() {
            return Ok(false);
        }
        if self.summarizer.is_none() {
            anyhow::bail!("summarizer is disabled");
        }
        self.write_summary(archive_path, &exchanges).await
    }

    /// Parse an archived transcript from its live source when that still
    /// exists, else from the archive copy.
    fn parse_archived(&self, archive_path: &Path) -> Result<Vec<Exchange>> {
        let project = transcripts::project_of(archive_path);
        let source =
            transcripts::current_transcript(&self.config.paths.transcript_root, archive_path);
        transcripts::parse_file(&source, &project, archive_path)
    }

    /// Replace every record of an archived transcript with a fresh parse.
    /// Returns the number of exchanges stored.
    ///
    /// All vectors are computed before anything is deleted, so an embedding
    /// failure leaves the existing records in place.
    pub async fn reindex_archive(&self, archive_path: &Path) -> Result<usize> {
        let exchanges = self.parse_archived(archive_path)?;
        let refs: Vec<&Exchange> = exchanges.iter().collect();
        let mut vectors = Vec::with_capacity(refs.len());
        for batch in refs.chunks(EMBED_BATCH) {
            let batch_vectors = self
                .embed_batch(batch)
                .await
                .with_context(|| format!("reindexing {}", archive_path.display()))?;
            vectors.extend(batch_vectors);
        }

        self.store
            .delete_by_archive_path(&archive_path.to_string_lossy())
            .await?;
        for (exchange, vector) in exchanges.iter().zip(vectors.iter()) {
            self.store.upsert_exchange(exchange, vector).await?;
        }
        Ok(exchanges.len())
    }
}

/// Render run counters for the terminal.
pub fn format_stats(stats: &IndexStats) -> String {
    format!(
        "index\n  transcripts seen: {}\n  transcripts processed: {}\n  archived: {}\n  \
         skipped (no exchanges): {}\n  summaries written: {}\n  summaries failed: {}\n  \
         exchanges embedded: {}\n  exchanges already indexed: {}\n  transcripts failed: {}\n",
        stats.transcripts_seen,
        stats.transcripts_processed,
        stats.archived,
        stats.skipped_empty,
        stats.summaries_written,
        stats.summaries_failed,
        stats.exchanges_embedded,
        stats.exchanges_already_indexed,
        stats.transcripts_failed,
    )
}

/// Entry point for `index-all`, `index-session` and `index-cleanup`.
pub async fn run_index(
    config: &Config,
    scope: &IndexScope,
    limit: Option<usize>,
    progress: &dyn IndexProgressReporter,
) -> Result<IndexStats> {
    if !config.embedding.is_enabled() {
        anyhow::bail!("Indexing requires an embedding provider; set [embedding] provider in the config");
    }
    let store = SqliteStore::open(config).await?;
    let embedder = create_embedder(&config.embedding)?;
    let summarizer = create_service(&config.summarizer)?;
    if summarizer.is_none() {
        warn!("summarizer disabled; summaries will be left for index-cleanup");
    }

    let indexer = Indexer::new(
        config,
        &store,
        embedder.as_ref(),
        summarizer.as_deref(),
        progress,
    );

    if let IndexScope::Session(session_id) = scope {
        if indexer.discover(scope)?.is_empty() {
            store.close().await;
            anyhow::bail!("No transcript found for session {}", session_id);
        }
    }

    let stats = indexer.run(scope, limit).await;
    store.close().await;
    let stats = stats?;
    print!("{}", format_stats(&stats));
    println!("ok");
    Ok(stats)
}

/// `rebuild`: wipe the database and summaries, then index everything.
pub async fn run_rebuild(config: &Config, progress: &dyn IndexProgressReporter) -> Result<()> {
    let cleanup = clear_for_rebuild(config)?;
    println!("Deleted {} database files", cleanup.database_files);
    println!("Deleted {} summary files", cleanup.summaries);
    migrate::run_migrations(config).await?;
    run_index(config, &IndexScope::All, None, progress).await?;
    Ok(())
}

/// What [`clear_for_rebuild`] removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildCleanup {
    pub database_files: usize,
    pub summaries: usize,
}

/// Delete the database (with its WAL side files) and every summary under
/// the archive root. Archive copies are kept.
pub fn clear_for_rebuild(config: &Config) -> Result<RebuildCleanup> {
    let mut cleanup = RebuildCleanup::default();

    for path in db::database_files(&config.db.path) {
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
            cleanup.database_files += 1;
        }
    }

    if config.paths.archive_root.is_dir() {
        for entry in WalkDir::new(&config.paths.archive_root) {
            let entry = entry?;
            if entry.file_type().is_file() && archive::is_summary_file(entry.path()) {
                std::fs::remove_file(entry.path()).with_context(|| {
                    format!("Failed to remove {}", entry.path().display())
                })?;
                cleanup.summaries += 1;
            }
        }
    }

    Ok(cleanup)
}
