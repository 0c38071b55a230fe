//! # Annotation Harness CLI (`annot`)
//!
//! ## Usage
//!
//! ```bash
//! annot --config ./config/annot.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `annot init` | Create the SQLite database and run schema migrations |
//! | `annot ingest kindle` | Ingest a Kindle `My Clippings.txt` file (or stdin) |
//! | `annot ingest oreilly` | Ingest an O'Reilly highlights CSV export (or stdin) |
//! | `annot stats` | Show book and annotation counts |
//! | `annot export` | Dump books and annotations as JSON |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! annot init --config ./config/annot.toml
//!
//! # Import clippings copied from the device
//! annot ingest kindle --input "/media/Kindle/documents/My Clippings.txt"
//!
//! # Preview a CSV import without writing anything
//! annot ingest oreilly --input safari-annotations-export.csv --dry-run
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use annotation_harness::config;
use annotation_harness::export;
use annotation_harness::ingest::{self, IngestSource};
use annotation_harness::logging;
use annotation_harness::migrate;
use annotation_harness::progress::ProgressMode;
use annotation_harness::stats;

/// Annotation Harness CLI: import e-reader clippings and highlight
/// exports into a local SQLite store.
#[derive(Parser)]
#[command(
    name = "annot",
    about = "Annotation Harness: import e-reader clippings and highlight exports into SQLite",
    version,
    long_about = "Annotation Harness parses Kindle clippings files and O'Reilly highlight CSV \
    exports, reconciles each book and annotation against what is already stored, and keeps \
    a single merged row per book and per annotation no matter how often an export is imported."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/annot.toml")]
    config: PathBuf,

    /// Enable debug logging for every record.
    #[arg(long, global = true)]
    debug: bool,

    /// Progress output on stderr. Defaults to `human` when stderr is a
    /// terminal, `off` otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `books` and `annotations`
    /// tables. Running it again is safe.
    Init,

    /// Ingest an export into the store.
    Ingest {
        #[command(subcommand)]
        source: SourceCommand,
    },

    /// Show book and annotation counts.
    Stats,

    /// Export every book with its annotations as JSON.
    Export {
        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Supported export formats.
#[derive(Subcommand)]
enum SourceCommand {
    /// Kindle `My Clippings.txt`.
    Kindle {
        /// Clippings file. Reads stdin when omitted.
        #[arg(long)]
        input: Option<PathBuf>,

        /// Origin tag stored on every annotation. Defaults to the input
        /// file name, or `stdin`.
        #[arg(long)]
        origin: Option<String>,

        /// Reconcile against the database as usual, then roll everything back.
        #[arg(long)]
        dry_run: bool,
    },

    /// O'Reilly highlights CSV export.
    Oreilly {
        /// CSV file. Reads stdin when omitted.
        #[arg(long)]
        input: Option<PathBuf>,

        /// Reconcile against the database as usual, then roll everything back.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.debug);

    let cfg = config::load_config(&cli.config)?;
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { source } => match source {
            SourceCommand::Kindle {
                input,
                origin,
                dry_run,
            } => {
                ingest::run_ingest(
                    &cfg,
                    IngestSource::Kindle,
                    input.as_deref(),
                    origin,
                    dry_run,
                    progress,
                )
                .await?;
            }
            SourceCommand::Oreilly { input, dry_run } => {
                ingest::run_ingest(
                    &cfg,
                    IngestSource::Oreilly,
                    input.as_deref(),
                    None,
                    dry_run,
                    progress,
                )
                .await?;
            }
        },
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Export { output } => {
            export::run_export(&cfg, output.as_deref()).await?;
        }
    }

    Ok(())
}
