//! # Repo Intake CLI (`intake`)
//!
//! ## Usage
//!
//! ```bash
//! intake --config ./config/intake.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `intake analyze <owner/name>` | Run the full pipeline and print a summary |
//! | `intake select <owner/name>` | Show the ranked file selection only |
//! | `intake chunks <files...>` | Extract chunks from local files (offline) |
//! | `intake rate-limit` | Show the current GitHub quota |
//! | `intake init` | Create the SQLite vector index |
//! | `intake search "<query>"` | Semantic search over indexed chunks |
//! | `intake serve` | Start the vector service HTTP API |
//! | `intake completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! # Analyze a repository and write the report
//! intake analyze tokio-rs/axum --output ./reports/axum.json
//!
//! # Analyze a tag and persist chunks for search
//! intake analyze tokio-rs/axum@axum-v0.8.0 --index
//!
//! # Search, only functions
//! intake search "route handler" --repo tokio-rs/axum --type function
//! ```
//!
//! Without a config file every setting falls back to its default.
//! Set `RUST_LOG=repo_intake=debug` for request-level logs on stderr.

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use repo_intake::analyze::{self, AnalyzeArgs};
use repo_intake::progress::ProgressMode;
use repo_intake::{config, db, extract_cmd, index, migrate, search, server};

/// Repo Intake: ranked file selection, semantic chunking and vector search
/// over GitHub repositories.
#[derive(Parser)]
#[command(
    name = "intake",
    about = "Repo Intake: analyze GitHub repositories into ranked files, code chunks and a searchable index",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/intake.toml`. A missing file means defaults.
    #[arg(long, global = true, default_value = "./config/intake.toml")]
    config: PathBuf,

    /// Progress reporting on stderr. Defaults to `human` on a TTY, else `off`.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a repository end to end.
    ///
    /// Fetches metadata and the file listing, ranks and selects files,
    /// downloads them in batches, extracts code chunks and builds the
    /// context document. Accepts `owner/name`, `owner/name@ref` or a
    /// github.com URL.
    Analyze {
        repo: String,

        /// Branch, tag or commit SHA (overrides `@ref` in the repo argument).
        #[arg(long = "ref")]
        git_ref: Option<String>,

        /// Embed chunks and store them in the vector index.
        #[arg(long)]
        index: bool,

        /// Write the full JSON report to this file.
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Write the context document (markdown) to this file.
        #[arg(long)]
        document: Option<PathBuf>,

        /// Print the JSON report on stdout instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// Rank and select files without downloading them.
    Select {
        repo: String,

        #[arg(long = "ref")]
        git_ref: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Extract code chunks from local files and print them as JSON.
    Chunks {
        files: Vec<PathBuf>,

        /// Report paths relative to this directory.
        #[arg(long)]
        root: Option<PathBuf>,

        /// Trim the output to this many estimated tokens.
        #[arg(long)]
        max_tokens: Option<usize>,
    },

    /// Show the current GitHub API quota.
    RateLimit,

    /// Initialize the vector index database. Idempotent.
    Init,

    /// Semantic search over indexed chunks.
    Search {
        query: String,

        /// Restrict to one repository namespace (`owner/name`).
        #[arg(long)]
        repo: Option<String>,

        #[arg(long)]
        limit: Option<usize>,

        /// Chunk type: function, class, component, hook, type, import, comment, config.
        #[arg(long = "type")]
        chunk_type: Option<String>,

        #[arg(long)]
        language: Option<String>,

        #[arg(long)]
        min_score: Option<f32>,

        #[arg(long)]
        json: bool,
    },

    /// Start the vector service HTTP API.
    Serve,

    /// Print shell completions.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "intake", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_or_default(&cli.config)?;
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    match cli.command {
        Commands::Analyze {
            repo,
            git_ref,
            index,
            output,
            document,
            json,
        } => {
            let args = AnalyzeArgs {
                repo,
                git_ref,
                index,
                output,
                json,
                document,
            };
            analyze::run_analyze(&cfg, args, progress).await?;
        }
        Commands::Select { repo, git_ref, json } => {
            analyze::run_select(&cfg, &repo, git_ref, json).await?;
        }
        Commands::Chunks {
            files,
            root,
            max_tokens,
        } => {
            extract_cmd::run_chunks(&cfg, &files, root.as_deref(), max_tokens)?;
        }
        Commands::RateLimit => {
            analyze::run_rate_limit(&cfg).await?;
        }
        Commands::Init => {
            let pool = db::connect(&cfg.index).await?;
            migrate::run_migrations(&pool).await?;
            println!("Index initialized at {}.", cfg.index.db_path.display());
        }
        Commands::Search {
            query,
            repo,
            limit,
            chunk_type,
            language,
            min_score,
            json,
        } => {
            search::run_search(&cfg, &query, repo, limit, chunk_type, language, min_score, json)
                .await?;
        }
        Commands::Serve => {
            let index = index::open_sqlite_index(&cfg).await?;
            server::run_server(&cfg, index).await?;
        }
        Commands::Completions { .. } => unreachable!(),
    }

    Ok(())
}
