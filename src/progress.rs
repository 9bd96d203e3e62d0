//! Indexing progress reporting.
//!
//! Progress goes to **stderr** so stdout stays parseable for scripts.
//! Human output by default on a TTY; `--progress json` emits one object
//! per line.

use std::io::Write;

/// A single progress event emitted by the indexer.
#[derive(Clone, Debug, PartialEq)]
pub enum IndexProgressEvent {
    /// Walking the transcript root; total unknown.
    Discovering,
    /// About to process transcript `n` of `total`.
    Processing {
        n: u64,
        total: u64,
        project: String,
        file: String,
    },
    /// A run finished.
    Done { processed: u64, exchanges: u64 },
}

/// Receives progress events from the indexer.
pub trait IndexProgressReporter: Send + Sync {
    fn report(&self, event: IndexProgressEvent);
}

/// Human-friendly lines: `index  12 / 1,340  my-project/abc.jsonl`.
pub struct StderrProgress;

impl IndexProgressReporter for StderrProgress {
    fn report(&self, event: IndexProgressEvent) {
        let line = human_line(&event);
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

fn human_line(event: &IndexProgressEvent) -> String {
    match event {
        IndexProgressEvent::Discovering => "index  discovering transcripts...\n".to_string(),
        IndexProgressEvent::Processing {
            n,
            total,
            project,
            file,
        } => format!(
            "index  {} / {}  {}/{}\n",
            format_number(*n),
            format_number(*total),
            project,
            file
        ),
        IndexProgressEvent::Done {
            processed,
            exchanges,
        } => format!(
            "index  done: {} transcripts, {} new exchanges\n",
            format_number(*processed),
            format_number(*exchanges)
        ),
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IndexProgressReporter for JsonProgress {
    fn report(&self, event: IndexProgressEvent) {
        if let Ok(line) = serde_json::to_string(&json_event(&event)) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

fn json_event(event: &IndexProgressEvent) -> serde_json::Value {
    match event {
        IndexProgressEvent::Discovering => serde_json::json!({
            "event": "progress",
            "phase": "discovering"
        }),
        IndexProgressEvent::Processing {
            n,
            total,
            project,
            file,
        } => serde_json::json!({
            "event": "progress",
            "phase": "indexing",
            "n": n,
            "total": total,
            "project": project,
            "file": file
        }),
        IndexProgressEvent::Done {
            processed,
            exchanges,
        } => serde_json::json!({
            "event": "done",
            "processed": processed,
            "exchanges": exchanges
        }),
    }
}

/// No-op reporter.
pub struct NoProgress;

impl IndexProgressReporter for NoProgress {
    fn report(&self, _event: IndexProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// `--progress` values.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn IndexProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
