//! End-to-end tests of the indexing pipeline, verifier and repairer against
//! a real SQLite store, with counting fakes for the embedding and
//! summarization services.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use convo_recall::archive::summary_path_for;
use convo_recall::config::{parse_config, Config};
use convo_recall::ingest::{clear_for_rebuild, IndexScope, Indexer};
use convo_recall::progress::NoProgress;
use convo_recall::search::search_exchanges;
use convo_recall::sqlite_store::SqliteStore;
use convo_recall::verify::{repair_index, verify_index};
use convo_recall::{db, migrate};
use convo_recall_core::embedding::{exchange_embedding_text, Embedder};
use convo_recall_core::store::ExchangeStore;
use convo_recall_core::summarize::{ModelTier, ServiceError, SummaryService};

const DIMS: usize = 8;

/// Deterministic bag-of-bytes embedder.
#[derive(Default)]
struct FakeEmbedder {
    calls: AtomicUsize,
    fail_all: bool,
}

impl FakeEmbedder {
    fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_all: true,
        }
    }
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn fake_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for (i, b) in text.bytes().enumerate() {
        v[i % DIMS] += b as f32 / 1000.0;
    }
    v
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all || texts.iter().any(|t| t.contains("EMBED_FAIL")) {
            anyhow::bail!("embedding service unavailable");
        }
        Ok(texts.iter().map(|t| fake_vector(t)).collect())
    }
}

struct FakeSummarizer {
    calls: AtomicUsize,
    fail: bool,
}

impl FakeSummarizer {
    fn ok() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }
    fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SummaryService for FakeSummarizer {
    async fn complete(&self, _prompt: &str, _tier: ModelTier) -> Result<String, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(ServiceError::Failed("service down".to_string()))
        } else {
            Ok("<summary>A focused debugging session.</summary>".to_string())
        }
    }
}

struct Env {
    _tmp: TempDir,
    root: PathBuf,
    config: Config,
}

impl Env {
    fn new() -> Self {
        Self::with_excluded(&[])
    }

    fn with_excluded(excluded: &[&str]) -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().to_path_buf();
        fs::create_dir_all(root.join("transcripts")).unwrap();
        let excluded = excluded
            .iter()
            .map(|p| format!("\"{}\"", p))
            .collect::<Vec<_>>()
            .join(", ");
        let text = format!(
            r#"
[db]
path = "{root}/data/recall.sqlite"

[paths]
transcript_root = "{root}/transcripts"
archive_root = "{root}/archive"

[indexing]
excluded_projects = [{excluded}]

[embedding]
provider = "ollama"
model = "fake"
dims = {dims}
"#,
            root = root.display(),
            excluded = excluded,
            dims = DIMS
        );
        let config = parse_config(&text).unwrap();
        Self {
            _tmp: tmp,
            root,
            config,
        }
    }

    fn transcript_path(&self, project: &str, file: &str) -> PathBuf {
        self.root.join("transcripts").join(project).join(file)
    }

    fn archive_path(&self, project: &str, file: &str) -> PathBuf {
        self.root.join("archive").join(project).join(file)
    }

    fn write_transcript(&self, project: &str, file: &str, body: &str) -> PathBuf {
        let path = self.transcript_path(project, file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, body).unwrap();
        path
    }

    async fn store(&self) -> SqliteStore {
        let pool = db::connect(&self.config).await.unwrap();
        migrate::migrate_pool(&pool).await.unwrap();
        SqliteStore::new(pool, DIMS)
    }
}

fn user(text: &str) -> String {
    serde_json::json!({
        "type": "user",
        "message": { "role": "user", "content": text },
        "timestamp": "2025-02-01T12:00:00.000Z",
    })
    .to_string()
}

fn assistant(text: &str) -> String {
    serde_json::json!({
        "type": "assistant",
        "message": { "role": "assistant", "content": [{ "type": "text", "text": text }] },
        "timestamp": "2025-02-01T12:00:30.000Z",
    })
    .to_string()
}

/// A transcript of `n` substantive exchanges about `topic`.
fn conversation(topic: &str, n: usize) -> String {
    let mut lines = Vec::new();
    for i in 0..n {
        lines.push(user(&format!(
            "Question {} about {}: why does the connection pool stall under load?",
            i, topic
        )));
        lines.push(assistant(&format!(
            "Answer {} about {}: the writer holds the lock while readers queue behind it.",
            i, topic
        )));
    }
    lines.join("\n") + "\n"
}

fn append(path: &Path, text: &str) {
    let mut body = fs::read_to_string(path).unwrap();
    body.push_str(text);
    fs::write(path, body).unwrap();
}

#[tokio::test]
async fn second_run_makes_no_service_calls() {
    let env = Env::new();
    env.write_transcript("alpha", "s1.jsonl", &conversation("sqlite", 3));
    env.write_transcript("beta", "s2.jsonl", &conversation("tokio", 2));

    let store = env.store().await;
    let embedder = FakeEmbedder::default();
    let summarizer = FakeSummarizer::ok();
    let indexer = Indexer::new(&env.config, &store, &embedder, Some(&summarizer), &NoProgress);

    let first = indexer.run(&IndexScope::All, None).await.unwrap();
    assert_eq!(first.transcripts_processed, 2);
    assert_eq!(first.archived, 2);
    assert_eq!(first.summaries_written, 2);
    assert_eq!(first.exchanges_embedded, 5);
    assert_eq!(store.count().await.unwrap(), 5);
    assert!(summary_path_for(&env.archive_path("alpha", "s1.jsonl")).exists());

    let embed_calls = embedder.calls();
    let summary_calls = summarizer.calls();

    let second = indexer.run(&IndexScope::All, None).await.unwrap();
    assert_eq!(second.transcripts_processed, 0);
    assert_eq!(second.exchanges_embedded, 0);
    assert_eq!(second.exchanges_already_indexed, 5);
    assert_eq!(embedder.calls(), embed_calls);
    assert_eq!(summarizer.calls(), summary_calls);
    assert_eq!(store.count().await.unwrap(), 5);
}

#[tokio::test]
async fn source_growth_is_indexed_without_touching_archive() {
    let env = Env::new();
    let source = env.write_transcript("alpha", "s1.jsonl", &conversation("sqlite", 2));

    let store = env.store().await;
    let embedder = FakeEmbedder::default();
    let summarizer = FakeSummarizer::ok();
    let indexer = Indexer::new(&env.config, &store, &embedder, Some(&summarizer), &NoProgress);
    indexer.run(&IndexScope::All, None).await.unwrap();

    let archive = env.archive_path("alpha", "s1.jsonl");
    let archived = fs::read_to_string(&archive).unwrap();
    append(&source, &user("Follow-up: does WAL mode change the picture?"));
    append(&source, "\n");
    append(&source, &assistant("Readers no longer block the writer in WAL mode."));

    let stats = indexer.run(&IndexScope::All, None).await.unwrap();
    assert_eq!(stats.archived, 0);
    assert_eq!(stats.transcripts_processed, 1);
    assert_eq!(stats.exchanges_embedded, 1);
    assert_eq!(stats.exchanges_already_indexed, 2);
    assert_eq!(fs::read_to_string(&archive).unwrap(), archived);
    assert_eq!(store.count().await.unwrap(), 3);

    let newest = store
        .recent(Some("alpha"), 10)
        .await
        .unwrap()
        .into_iter()
        .find(|e| e.user_message.contains("WAL mode"))
        .unwrap();
    assert_eq!(newest.archive_path, archive.to_string_lossy());
    assert_eq!(newest.line_start, 5);

    let report = verify_index(&env.config, &store).await.unwrap();
    assert!(report.is_healthy(), "{:?}", report);
}

#[tokio::test]
async fn provenance_points_into_archive_copy() {
    let env = Env::new();
    env.write_transcript("alpha", "s1.jsonl", &conversation("sqlite", 2));

    let store = env.store().await;
    let embedder = FakeEmbedder::default();
    let indexer = Indexer::new(&env.config, &store, &embedder, None, &NoProgress);
    indexer.run(&IndexScope::All, None).await.unwrap();

    let archive = env.archive_path("alpha", "s1.jsonl");
    let lines: Vec<String> = fs::read_to_string(&archive)
        .unwrap()
        .lines()
        .map(String::from)
        .collect();
    let recent = store.recent(Some("alpha"), 10).await.unwrap();
    assert_eq!(recent.len(), 2);
    for ex in &recent {
        assert_eq!(ex.archive_path, archive.to_string_lossy());
        let user_line = &lines[(ex.line_start - 1) as usize];
        assert!(user_line.contains(&ex.user_message));
    }
}

#[tokio::test]
async fn empty_transcript_is_archived_but_not_indexed() {
    let env = Env::new();
    env.write_transcript("alpha", "empty.jsonl", &format!("{}\n", user("never answered")));

    let store = env.store().await;
    let embedder = FakeEmbedder::default();
    let summarizer = FakeSummarizer::ok();
    let indexer = Indexer::new(&env.config, &store, &embedder, Some(&summarizer), &NoProgress);
    let stats = indexer.run(&IndexScope::All, None).await.unwrap();

    assert_eq!(stats.skipped_empty, 1);
    assert_eq!(stats.archived, 1);
    assert_eq!(summarizer.calls(), 0);
    assert_eq!(embedder.calls(), 0);
    assert!(!summary_path_for(&env.archive_path("alpha", "empty.jsonl")).exists());
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn limit_counts_only_transcripts_with_work() {
    let env = Env::new();
    for name in ["a.jsonl", "b.jsonl", "c.jsonl"] {
        env.write_transcript("alpha", name, &conversation(name, 2));
    }

    let store = env.store().await;
    let embedder = FakeEmbedder::default();
    let indexer = Indexer::new(&env.config, &store, &embedder, None, &NoProgress);

    let first = indexer.run(&IndexScope::All, Some(2)).await.unwrap();
    assert_eq!(first.transcripts_processed, 2);
    assert_eq!(store.count().await.unwrap(), 4);

    let second = indexer.run(&IndexScope::All, Some(2)).await.unwrap();
    assert_eq!(second.transcripts_processed, 1);
    assert_eq!(store.count().await.unwrap(), 6);
}

#[tokio::test]
async fn project_session_and_exclusion_scopes() {
    let env = Env::with_excluded(&["meta-*"]);
    env.write_transcript("alpha", "1111-aaaa.jsonl", &conversation("a", 2));
    env.write_transcript("beta", "2222-bbbb.jsonl", &conversation("b", 2));
    env.write_transcript("meta-notes", "3333-cccc.jsonl", &conversation("c", 2));

    let store = env.store().await;
    let embedder = FakeEmbedder::default();
    let indexer = Indexer::new(&env.config, &store, &embedder, None, &NoProgress);

    let all = indexer.discover(&IndexScope::All).unwrap();
    assert_eq!(all.len(), 2);

    let session = indexer
        .discover(&IndexScope::Session("2222".to_string()))
        .unwrap();
    assert_eq!(session.len(), 1);
    assert_eq!(session[0].transcript.project, "beta");

    assert!(indexer
        .discover(&IndexScope::Project("meta-notes".to_string()))
        .unwrap()
        .is_empty());

    let stats = indexer
        .run(&IndexScope::Project("alpha".to_string()), None)
        .await
        .unwrap();
    assert_eq!(stats.transcripts_processed, 1);
    assert!(!env.archive_path("beta", "2222-bbbb.jsonl").exists());
    assert!(!env.archive_path("meta-notes", "3333-cccc.jsonl").exists());
}

#[tokio::test]
async fn cleanup_scope_only_summarizes_unprocessed() {
    let env = Env::new();
    env.write_transcript("alpha", "s1.jsonl", &conversation("one", 2));
    env.write_transcript("alpha", "s2.jsonl", &conversation("two", 2));

    let store = env.store().await;
    let embedder = FakeEmbedder::default();
    let summarizer = FakeSummarizer::ok();
    let indexer = Indexer::new(&env.config, &store, &embedder, Some(&summarizer), &NoProgress);
    indexer.run(&IndexScope::All, None).await.unwrap();

    fs::remove_file(summary_path_for(&env.archive_path("alpha", "s2.jsonl"))).unwrap();
    let jobs = indexer.discover(&IndexScope::Unprocessed).unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].transcript.file_name, "s2.jsonl");

    let summary_calls = summarizer.calls();
    let embed_calls = embedder.calls();
    let stats = indexer.run(&IndexScope::Unprocessed, None).await.unwrap();
    assert_eq!(stats.summaries_written, 1);
    assert_eq!(summarizer.calls(), summary_calls + 1);
    assert_eq!(embedder.calls(), embed_calls);
}

#[tokio::test]
async fn summarizer_failure_does_not_block_indexing() {
    let env = Env::new();
    env.write_transcript("alpha", "s1.jsonl", &conversation("sqlite", 3));

    let store = env.store().await;
    let embedder = FakeEmbedder::default();
    let summarizer = FakeSummarizer::failing();
    let indexer = Indexer::new(&env.config, &store, &embedder, Some(&summarizer), &NoProgress);
    let stats = indexer.run(&IndexScope::All, None).await.unwrap();

    assert_eq!(stats.summaries_failed, 1);
    assert_eq!(stats.summaries_written, 0);
    assert_eq!(stats.exchanges_embedded, 3);
    assert!(!summary_path_for(&env.archive_path("alpha", "s1.jsonl")).exists());
}

#[tokio::test]
async fn embedding_failure_abandons_only_that_transcript() {
    let env = Env::new();
    env.write_transcript(
        "alpha",
        "a.jsonl",
        &[user("EMBED_FAIL please"), assistant("sure")].join("\n"),
    );
    env.write_transcript("alpha", "b.jsonl", &conversation("fine", 2));

    let store = env.store().await;
    let embedder = FakeEmbedder::default();
    let indexer = Indexer::new(&env.config, &store, &embedder, None, &NoProgress);
    let stats = indexer.run(&IndexScope::All, None).await.unwrap();

    assert_eq!(stats.transcripts_failed, 1);
    assert_eq!(stats.exchanges_embedded, 2);
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn search_finds_exact_exchange_first() {
    let env = Env::new();
    env.write_transcript("alpha", "s1.jsonl", &conversation("sqlite", 3));
    env.write_transcript("beta", "s2.jsonl", &conversation("kubernetes", 3));

    let store = env.store().await;
    let embedder = FakeEmbedder::default();
    let indexer = Indexer::new(&env.config, &store, &embedder, None, &NoProgress);
    indexer.run(&IndexScope::All, None).await.unwrap();

    let target = store
        .recent(Some("beta"), 10)
        .await
        .unwrap()
        .into_iter()
        .next()
        .unwrap();
    let query = exchange_embedding_text(&target);

    let hits = search_exchanges(&store, &embedder, &query, 4, None)
        .await
        .unwrap();
    assert_eq!(hits.len(), 4);
    assert_eq!(hits[0].exchange.id, target.id);
    assert_eq!(hits[0].distance, 0.0);
    assert_eq!(hits[0].similarity, 1.0);
    for pair in hits.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }

    let filtered = search_exchanges(&store, &embedder, &query, 10, Some("alpha"))
        .await
        .unwrap();
    assert_eq!(filtered.len(), 3);
    assert!(filtered.iter().all(|h| h.exchange.project == "alpha"));
}

#[tokio::test]
async fn verify_reports_each_category_and_repair_heals() {
    let env = Env::new();
    env.write_transcript("alpha", "keep.jsonl", &conversation("keep", 2));
    env.write_transcript("alpha", "nosummary.jsonl", &conversation("nosummary", 2));
    env.write_transcript("alpha", "gone.jsonl", &conversation("gone", 2));
    env.write_transcript("alpha", "grown.jsonl", &conversation("grown", 2));

    let store = env.store().await;
    let embedder = FakeEmbedder::default();
    let summarizer = FakeSummarizer::ok();
    let indexer = Indexer::new(&env.config, &store, &embedder, Some(&summarizer), &NoProgress);
    indexer.run(&IndexScope::All, None).await.unwrap();

    let healthy = verify_index(&env.config, &store).await.unwrap();
    assert!(healthy.is_healthy(), "{:?}", healthy);

    let nosummary = env.archive_path("alpha", "nosummary.jsonl");
    let gone = env.archive_path("alpha", "gone.jsonl");
    let grown = env.archive_path("alpha", "grown.jsonl");
    let corrupted = env.archive_path("alpha", "corrupted.jsonl");
    let tiny = env.archive_path("alpha", "tiny.jsonl");

    fs::remove_file(summary_path_for(&nosummary)).unwrap();
    fs::remove_file(&gone).unwrap();
    fs::remove_file(summary_path_for(&gone)).unwrap();
    append(
        &env.transcript_path("alpha", "grown.jsonl"),
        &conversation("extra", 1),
    );
    fs::write(&corrupted, "x".repeat(2048)).unwrap();
    fs::write(&tiny, "garbage").unwrap();

    let report = verify_index(&env.config, &store).await.unwrap();
    assert_eq!(report.missing, vec![nosummary.to_string_lossy().to_string()]);
    assert_eq!(report.orphaned.len(), 1);
    assert_eq!(report.orphaned[0].archive_path, gone.to_string_lossy());
    assert_eq!(report.orphaned[0].exchanges, 2);
    assert_eq!(report.outdated.len(), 1);
    assert_eq!(report.outdated[0].archive_path, grown.to_string_lossy());
    assert_eq!(report.outdated[0].unindexed, 1);
    assert_eq!(report.outdated[0].stale, 0);
    assert_eq!(report.corrupted.len(), 1);
    assert_eq!(report.corrupted[0].archive_path, corrupted.to_string_lossy());
    assert_eq!(report.corrupted[0].bytes, 2048);

    let keep_summary = summary_path_for(&env.archive_path("alpha", "keep.jsonl"));
    let keep_before = fs::metadata(&keep_summary).unwrap().modified().unwrap();

    let repair = repair_index(&report, &indexer, &store).await.unwrap();
    assert_eq!(repair.summaries_written, 1);
    assert_eq!(repair.orphaned_records_deleted, 2);
    assert_eq!(repair.transcripts_reindexed, 1);
    assert_eq!(repair.failures, 0);

    let after = verify_index(&env.config, &store).await.unwrap();
    assert!(after.missing.is_empty());
    assert!(after.orphaned.is_empty());
    assert!(after.outdated.is_empty());
    assert_eq!(after.corrupted.len(), 1);

    assert_eq!(fs::read_to_string(&corrupted).unwrap(), "x".repeat(2048));
    assert_eq!(
        fs::metadata(&keep_summary).unwrap().modified().unwrap(),
        keep_before
    );
    assert_eq!(store.ids_for_archive(&grown.to_string_lossy()).await.unwrap().len(), 3);
}

#[tokio::test]
async fn stale_records_are_outdated() {
    let env = Env::new();
    env.write_transcript("alpha", "s1.jsonl", &conversation("sqlite", 3));

    let store = env.store().await;
    let embedder = FakeEmbedder::default();
    let summarizer = FakeSummarizer::ok();
    let indexer = Indexer::new(&env.config, &store, &embedder, Some(&summarizer), &NoProgress);
    indexer.run(&IndexScope::All, None).await.unwrap();

    // With the live file gone, truncate the archive copy to its first
    // exchange.
    fs::remove_file(env.transcript_path("alpha", "s1.jsonl")).unwrap();
    let archive = env.archive_path("alpha", "s1.jsonl");
    let first_two: Vec<String> = fs::read_to_string(&archive)
        .unwrap()
        .lines()
        .take(2)
        .map(String::from)
        .collect();
    fs::write(&archive, first_two.join("\n")).unwrap();

    let report = verify_index(&env.config, &store).await.unwrap();
    assert_eq!(report.outdated.len(), 1);
    assert_eq!(report.outdated[0].unindexed, 0);
    assert_eq!(report.outdated[0].stale, 2);
    assert!(report.missing.is_empty());
}

#[tokio::test]
async fn rebuild_cleanup_keeps_archive() {
    let env = Env::new();
    env.write_transcript("alpha", "s1.jsonl", &conversation("sqlite", 2));

    {
        let store = env.store().await;
        let embedder = FakeEmbedder::default();
        let summarizer = FakeSummarizer::ok();
        let indexer =
            Indexer::new(&env.config, &store, &embedder, Some(&summarizer), &NoProgress);
        indexer.run(&IndexScope::All, None).await.unwrap();
        store.close().await;
    }

    let archive = env.archive_path("alpha", "s1.jsonl");
    assert!(summary_path_for(&archive).exists());

    let cleanup = clear_for_rebuild(&env.config).unwrap();
    assert!(cleanup.database_files >= 1);
    assert_eq!(cleanup.summaries, 1);
    assert!(!env.config.db.path.exists());
    assert!(!summary_path_for(&archive).exists());
    assert!(archive.exists());

    let store = env.store().await;
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn repair_with_failing_embedder_keeps_records() {
    let env = Env::new();
    env.write_transcript("alpha", "s1.jsonl", &conversation("sqlite", 3));

    let store = env.store().await;
    let embedder = FakeEmbedder::default();
    let summarizer = FakeSummarizer::ok();
    let indexer = Indexer::new(&env.config, &store, &embedder, Some(&summarizer), &NoProgress);
    indexer.run(&IndexScope::All, None).await.unwrap();

    let archive = env.archive_path("alpha", "s1.jsonl").to_string_lossy().to_string();
    let ids_before = store.ids_for_archive(&archive).await.unwrap();
    assert_eq!(ids_before.len(), 3);

    append(
        &env.transcript_path("alpha", "s1.jsonl"),
        &conversation("extra", 1),
    );
    let report = verify_index(&env.config, &store).await.unwrap();
    assert_eq!(report.outdated.len(), 1);

    let broken = FakeEmbedder::failing();
    let repairer = Indexer::new(&env.config, &store, &broken, Some(&summarizer), &NoProgress);
    let repair = repair_index(&report, &repairer, &store).await.unwrap();
    assert_eq!(repair.failures, 1);
    assert_eq!(repair.transcripts_reindexed, 0);
    assert!(broken.calls() > 0);

    assert_eq!(store.count().await.unwrap(), 3);
    assert_eq!(store.ids_for_archive(&archive).await.unwrap(), ids_before);
}

#[tokio::test]
async fn repair_with_failing_summarizer_counts_failure() {
    let env = Env::new();
    env.write_transcript("alpha", "s1.jsonl", &conversation("sqlite", 2));

    let store = env.store().await;
    let embedder = FakeEmbedder::default();
    let indexer = Indexer::new(&env.config, &store, &embedder, None, &NoProgress);
    indexer.run(&IndexScope::All, None).await.unwrap();

    let archive = env.archive_path("alpha", "s1.jsonl");
    let report = verify_index(&env.config, &store).await.unwrap();
    assert_eq!(report.missing, vec![archive.to_string_lossy().to_string()]);

    let summarizer = FakeSummarizer::failing();
    let repairer = Indexer::new(&env.config, &store, &embedder, Some(&summarizer), &NoProgress);
    let repair = repair_index(&report, &repairer, &store).await.unwrap();
    assert_eq!(repair.failures, 1);
    assert_eq!(repair.summaries_written, 0);
    assert_eq!(summarizer.calls(), 1);
    assert!(!summary_path_for(&archive).exists());

    let after = verify_index(&env.config, &store).await.unwrap();
    assert_eq!(after.missing.len(), 1);
    assert_eq!(store.count().await.unwrap(), 2);
}
