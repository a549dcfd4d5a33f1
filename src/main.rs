//! # Scout CLI (`scout`)
//!
//! The `scout` binary runs property searches inline or serves the search
//! surface over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! scout --config ./config/scout.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scout init` | Create the SQLite session store schema |
//! | `scout sources` | List configured listing sources and their health |
//! | `scout search --preferences <file>` | Run one search and print the final reports |
//! | `scout serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Search the sample fixture with human progress on stderr
//! scout search --preferences ./fixtures/preferences.json --config ./config/scout.example.toml
//!
//! # Same, machine-readable
//! scout search --preferences ./fixtures/preferences.json --progress json --json
//!
//! # Serve on [server].bind
//! RUST_LOG=scout_harness=debug scout serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use scout_harness::{config, migrate, progress::ProgressMode, search, server, sources};

/// Scout: a multi-source property search pipeline with feedback-driven
/// re-ranking.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/scout.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "scout",
    about = "Scout: multi-source property search with feedback-driven re-ranking",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/scout.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the SQLite session store.
    ///
    /// Idempotent. Does nothing when `[store].backend` is `memory`.
    Init,

    /// List configured listing sources and their status.
    Sources,

    /// Run one search inline and print the final reports.
    Search {
        /// Preferences JSON file (price, bedrooms, location, property types, ...).
        #[arg(long)]
        preferences: PathBuf,

        /// Progress output on stderr: `human`, `json`, or `off`.
        /// Defaults to human when stderr is a terminal.
        #[arg(long)]
        progress: Option<String>,

        /// Print reports as JSON instead of a table.
        #[arg(long)]
        json: bool,

        /// Only print the top N reports.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            if migrate::run_migrations(&cfg).await? {
                println!("Session store initialized successfully.");
            } else {
                println!("Store backend is 'memory'; nothing to initialize.");
            }
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Search {
            preferences,
            progress,
            json,
            limit,
        } => {
            let mode = match progress.as_deref() {
                Some(p) => ProgressMode::parse(p)?,
                None => ProgressMode::default_for_tty(),
            };
            search::run_search(&cfg, &preferences, mode, json, limit).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
