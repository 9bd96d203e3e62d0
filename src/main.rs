//! # convo-recall CLI (`recall`)
//!
//! ## Usage
//!
//! ```bash
//! recall --config ./config/recall.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `recall init` | Create the SQLite database and schema |
//! | `recall index-all` | Archive, summarize and embed every transcript |
//! | `recall index-session <id>` | Index the transcript of one session |
//! | `recall index-cleanup` | Index transcripts that have no summary yet |
//! | `recall verify` | Report missing, orphaned, outdated and corrupted entries |
//! | `recall repair` | Fix what `verify` reports |
//! | `recall rebuild` | Delete the index and summaries, then index everything |
//! | `recall search "<query>"` | Semantic search over indexed exchanges |
//! | `recall recent` | Most recently indexed exchanges |
//! | `recall dump <file>` | Print the conversation text a transcript yields |
//! | `recall completions <shell>` | Shell completion script |

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use convo_recall::ingest::IndexScope;
use convo_recall::progress::ProgressMode;
use convo_recall::{config, dump, ingest, migrate, recent, search, verify};

/// convo-recall: a searchable archive of conversation transcripts.
///
/// All commands except `dump` and `completions` read a TOML config file.
/// See `config/recall.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "recall",
    about = "Searchable, semantically indexed archive of conversation transcripts",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/recall.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Progress output on stderr while indexing. Defaults to human on a
    /// TTY, otherwise off.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProgressArg {
    Human,
    Json,
    Off,
}

impl From<ProgressArg> for ProgressMode {
    fn from(arg: ProgressArg) -> Self {
        match arg {
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
            ProgressArg::Off => ProgressMode::Off,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Index every transcript under the transcript root.
    IndexAll {
        /// Only index this project directory.
        #[arg(long)]
        project: Option<String>,

        /// Stop after this many transcripts have had work done.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Index the transcript whose file name contains the session id.
    IndexSession {
        session_id: String,
    },

    /// Index transcripts whose archive copy has no summary yet.
    IndexCleanup,

    /// Check archive, summaries and index for drift. Exits non-zero when
    /// issues are found.
    Verify {
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Verify, then repair missing summaries, orphaned records and
    /// outdated transcripts. Corrupted transcripts are reported only.
    Repair,

    /// Delete the database and all summaries, then index everything.
    Rebuild,

    /// Semantic search over indexed exchanges.
    Search {
        query: String,

        /// Maximum number of results (default: retrieval.default_limit).
        #[arg(long)]
        limit: Option<usize>,

        /// Only return exchanges from this project.
        #[arg(long)]
        project: Option<String>,

        /// Print hits as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List the most recent indexed exchanges.
    Recent {
        #[arg(long)]
        project: Option<String>,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    /// Print the conversation text a transcript yields.
    Dump {
        file: PathBuf,
    },

    /// Generate shell completions on stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("RECALL_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    // Commands that don't require config
    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "recall", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Dump { file } => {
            dump::run_dump(file)?;
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;
    let progress = cli
        .progress
        .map(ProgressMode::from)
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::IndexAll { project, limit } => {
            let scope = match project {
                Some(p) => IndexScope::Project(p),
                None => IndexScope::All,
            };
            ingest::run_index(&cfg, &scope, limit, progress.as_ref()).await?;
        }
        Commands::IndexSession { session_id } => {
            ingest::run_index(
                &cfg,
                &IndexScope::Session(session_id),
                None,
                progress.as_ref(),
            )
            .await?;
        }
        Commands::IndexCleanup => {
            ingest::run_index(&cfg, &IndexScope::Unprocessed, None, progress.as_ref()).await?;
        }
        Commands::Verify { json } => {
            if !verify::run_verify(&cfg, json).await? {
                std::process::exit(1);
            }
        }
        Commands::Repair => {
            verify::run_repair(&cfg).await?;
        }
        Commands::Rebuild => {
            ingest::run_rebuild(&cfg, progress.as_ref()).await?;
        }
        Commands::Search {
            query,
            limit,
            project,
            json,
        } => {
            search::run_search(&cfg, &query, limit, project.as_deref(), json).await?;
        }
        Commands::Recent {
            project,
            limit,
            json,
        } => {
            recent::run_recent(&cfg, project.as_deref(), limit, json).await?;
        }
        Commands::Dump { .. } | Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
