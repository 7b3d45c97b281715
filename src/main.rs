//! # Zici CLI (`zi`)
//!
//! The `zi` binary is the primary interface for Zici. It provides commands
//! for database initialization, exposure tracking, progress queries, and
//! starting the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! zi --config ./config/zici.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `zi init` | Create the SQLite database and run schema migrations |
//! | `zi track` | Ingest one analysis event from a frequency-counts file |
//! | `zi progress` | Print a user's full progress summary |
//! | `zi recommend` | Print a user's learning recommendations |
//! | `zi mastered` | Print a user's mastered characters and words |
//! | `zi stats` | Print a database overview |
//! | `zi serve` | Start the HTTP server |

use anyhow::Result;
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

use zici::progress::{ItemKindFilter, ProgressQueryService};
use zici::registry::{AnalysisRecord, FileRegistry};
use zici::store_sqlite::SqliteExposureStore;
use zici::tracker::ExposureTracker;
use zici::{config, db, migrate, server, stats};

/// Zici CLI — exposure tracking and mastery progress for Chinese reading
/// practice.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/zici.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "zi",
    about = "Zici — exposure tracking and mastery progress for Chinese reading practice",
    version,
    long_about = "Zici ingests per-document character and word frequency counts as exposure \
    events, classifies every item into a mastery tier, and answers progress, recommendation, \
    and mastered-item queries via a CLI and a JSON HTTP server."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/zici.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (user_progress, files). This command is idempotent — running it
    /// multiple times is safe.
    Init,

    /// Ingest one analysis event from a frequency-counts JSON file.
    ///
    /// The counts file is produced by the document-analysis pipeline and
    /// has the shape `{"characters": {"你": 3}, "words": {"你好": 1}}`.
    /// The file content is registered in the dedup registry, so
    /// re-tracking identical counts reuses the same file id.
    Track {
        /// User to credit the exposure to.
        #[arg(long)]
        user: String,

        /// Path to the frequency-counts JSON file.
        #[arg(long)]
        counts: PathBuf,

        /// Display name of the analyzed document. Defaults to the counts
        /// file name.
        #[arg(long)]
        filename: Option<String>,
    },

    /// Print a user's full progress summary as JSON.
    Progress {
        #[arg(long)]
        user: String,
    },

    /// Print a user's learning recommendations as JSON.
    ///
    /// Recommends items at the `learning` tier — seen enough to be
    /// familiar territory, not enough to be known.
    Recommend {
        #[arg(long)]
        user: String,
    },

    /// Print a user's mastered items as JSON.
    Mastered {
        #[arg(long)]
        user: String,

        /// Which item kind to include: characters, words, or both.
        #[arg(long, default_value = "both")]
        kind: String,
    },

    /// Print a database overview: users, files, sessions, per-user counts.
    Stats,

    /// Start the JSON HTTP server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// exposure tracking API.
    Serve,
}

/// On-disk shape of a frequency-counts document.
#[derive(Deserialize)]
struct CountsDocument {
    #[serde(default)]
    characters: IndexMap<String, i64>,
    #[serde(default)]
    words: IndexMap<String, i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Track {
            user,
            counts,
            filename,
        } => {
            run_track(&cfg, &user, &counts, filename.as_deref()).await?;
        }
        Commands::Progress { user } => {
            let progress = progress_service(&cfg).await?;
            let summary = progress.get_user_progress(&user).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Recommend { user } => {
            let progress = progress_service(&cfg).await?;
            let recs = progress.get_learning_recommendations(&user).await?;
            println!("{}", serde_json::to_string_pretty(&recs)?);
        }
        Commands::Mastered { user, kind } => {
            let kind: ItemKindFilter = kind.parse().map_err(anyhow::Error::msg)?;
            let progress = progress_service(&cfg).await?;
            let items = progress.get_mastered_items(&user, kind).await?;
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

async fn progress_service(cfg: &config::Config) -> Result<ProgressQueryService> {
    let pool = db::connect(cfg).await?;
    Ok(ProgressQueryService::new(Arc::new(SqliteExposureStore::new(
        pool,
    ))))
}

async fn run_track(
    cfg: &config::Config,
    user: &str,
    counts_path: &PathBuf,
    filename: Option<&str>,
) -> Result<()> {
    let content = std::fs::read(counts_path)?;
    let doc: CountsDocument = serde_json::from_slice(&content)?;

    let display_name = filename
        .map(|f| f.to_string())
        .or_else(|| {
            counts_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
        })
        .unwrap_or_else(|| "untitled".to_string());

    let pool = db::connect(cfg).await?;
    let registry = FileRegistry::new(pool.clone());
    let file_id = registry
        .register_file(&display_name, &content, user, Some("application/json"))
        .await?;

    let store = Arc::new(SqliteExposureStore::new(pool));
    let tracker = ExposureTracker::new(store, cfg.tracking.history_cap);
    let session = tracker
        .track_exposure(user, &doc.characters, &doc.words, &file_id, &display_name)
        .await?;

    registry
        .add_analysis_record(
            &file_id,
            AnalysisRecord {
                analysis_id: session.session_id.clone(),
                user_id: user.to_string(),
                timestamp: session.timestamp,
                characters_encountered: session.characters_encountered,
                words_encountered: session.words_encountered,
            },
        )
        .await?;

    println!("track {}", user);
    println!("  file: {} ({})", file_id, display_name);
    println!("  characters: {}", session.characters_encountered);
    println!("  words: {}", session.words_encountered);
    println!("  new characters: {}", session.new_characters);
    println!("  new words: {}", session.new_words);
    println!("ok");

    Ok(())
}
