//! TOML configuration.
//!
//! Every directory the pipeline touches is explicit here; nothing is derived
//! from the home directory at runtime. See `config/recall.example.toml`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub paths: PathsConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    /// Directory of project directories holding live transcripts.
    pub transcript_root: PathBuf,
    /// Mirror of `transcript_root`; holds archive copies and summaries.
    pub archive_root: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexingConfig {
    /// Project directory names (or glob patterns) never indexed.
    #[serde(default)]
    pub excluded_projects: Vec<String>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_direct_summary_threshold")]
    pub direct_summary_threshold: usize,
    /// Archived transcripts at least this large that parse to nothing are
    /// reported as corrupted.
    #[serde(default = "default_corrupted_min_bytes")]
    pub corrupted_min_bytes: u64,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            excluded_projects: Vec::new(),
            chunk_size: default_chunk_size(),
            direct_summary_threshold: default_direct_summary_threshold(),
            corrupted_min_bytes: default_corrupted_min_bytes(),
        }
    }
}

fn default_chunk_size() -> usize {
    8
}
fn default_direct_summary_threshold() -> usize {
    15
}
fn default_corrupted_min_bytes() -> u64 {
    1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the `ollama` provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizerConfig {
    #[serde(default = "default_summarizer_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Model used after the standard model exhausts its budget.
    #[serde(default)]
    pub escalation_model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_summarizer_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL override (Anthropic-compatible proxy or Ollama host).
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            provider: default_summarizer_provider(),
            model: None,
            escalation_model: None,
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
            timeout_secs: default_summarizer_timeout_secs(),
            url: None,
        }
    }
}

fn default_summarizer_provider() -> String {
    "disabled".to_string()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_summarizer_timeout_secs() -> u64 {
    120
}

impl SummarizerConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
        }
    }
}

fn default_limit() -> usize {
    10
}

/// Parse and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.indexing.chunk_size == 0 {
        bail!("indexing.chunk_size must be > 0");
    }
    if config.indexing.direct_summary_threshold == 0 {
        bail!("indexing.direct_summary_threshold must be > 0");
    }
    if config.retrieval.default_limit < 1 {
        bail!("retrieval.default_limit must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.provider != "local" && config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.summarizer.provider.as_str() {
        "disabled" | "anthropic" | "ollama" => {}
        other => bail!(
            "Unknown summarizer provider: '{}'. Must be disabled, anthropic, or ollama.",
            other
        ),
    }
    if config.summarizer.provider == "ollama" && config.summarizer.model.is_none() {
        bail!("summarizer.model must be specified when provider is 'ollama'");
    }

    Ok(config)
}
