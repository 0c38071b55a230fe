//! `annot ingest` command.
//!
//! Opens the input (a file or stdin), picks a store, runs the matching core
//! driver, and prints the run summary on stdout.
//!
//! `--dry-run` reconciles against the existing database inside a
//! transaction that is rolled back, so its counts match what a real run
//! would report. Without a database file it uses an in-memory store and
//! creates nothing on disk.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use annotation_harness_core::error as core_error;
use annotation_harness_core::ingest::{ingest_clippings, ingest_csv, IngestOptions};
use annotation_harness_core::reconcile::IngestSummary;
use annotation_harness_core::store::memory::InMemoryStore;
use annotation_harness_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::progress::{IngestProgressEvent, ProgressMode};
use crate::sqlite_store::{DryRunStore, SqliteStore};

/// Which export format the input is in.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IngestSource {
    /// Kindle `My Clippings.txt`.
    Kindle,
    /// O'Reilly highlights CSV export.
    Oreilly,
}

impl IngestSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestSource::Kindle => "kindle",
            IngestSource::Oreilly => "oreilly",
        }
    }
}

/// Run one ingest pass.
///
/// `origin` only applies to Kindle input; CSV rows carry their own book URL.
pub async fn run_ingest(
    config: &Config,
    source: IngestSource,
    input: Option<&Path>,
    origin: Option<String>,
    dry_run: bool,
    progress: ProgressMode,
) -> Result<()> {
    let (reader, input_label): (Box<dyn Read>, String) = match input {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open input: {}", path.display()))?;
            let label = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            (Box::new(file), label)
        }
        None => {
            eprintln!("Reading from stdin");
            (Box::new(io::stdin().lock()), "stdin".to_string())
        }
    };

    let options = config.ingest.options();
    let reporter = progress.reporter();
    let last_record = std::cell::Cell::new(0u64);
    let on_record = |n: usize| {
        last_record.set(n as u64);
        reporter.report(IngestProgressEvent::Ingesting {
            source: source.as_str().to_string(),
            n: n as u64,
        });
    };

    info!(
        source = source.as_str(),
        input = %input_label,
        dry_run,
        location_merge = %options.location_merge,
        "starting ingest"
    );

    let origin = origin.unwrap_or_else(|| input_label.clone());
    let run = DriverRun {
        source,
        origin: &origin,
        label: &input_label,
        options: &options,
        on_record: &on_record,
    };

    let result = if !dry_run {
        let pool = db::connect(config).await?;
        migrate::apply_schema(&pool).await?;
        let result = run.drive(reader, &SqliteStore::new(pool.clone())).await;
        pool.close().await;
        result
    } else if config.db.path.exists() {
        let pool = db::connect(config).await?;
        let store = DryRunStore::begin(&pool).await?;
        let result = run.drive(reader, &store).await;
        store.rollback().await?;
        pool.close().await;
        result
    } else {
        // No database yet, so every record would be new.
        debug!(path = %config.db.path.display(), "dry run without a database");
        run.drive(reader, &InMemoryStore::new()).await
    };

    let summary =
        result.with_context(|| format!("ingest {} from {} failed", source.as_str(), input_label))?;

    reporter.report(IngestProgressEvent::Finished {
        source: source.as_str().to_string(),
        n: last_record.get(),
    });
    print!("{}", format_summary(source, &summary, dry_run));
    Ok(())
}

/// Driver arguments shared by every store choice.
struct DriverRun<'a> {
    source: IngestSource,
    origin: &'a str,
    label: &'a str,
    options: &'a IngestOptions,
    on_record: &'a dyn Fn(usize),
}

impl DriverRun<'_> {
    async fn drive<S>(&self, reader: Box<dyn Read>, store: &S) -> core_error::Result<IngestSummary>
    where
        S: Store + ?Sized,
    {
        match self.source {
            IngestSource::Kindle => {
                ingest_clippings(reader, self.origin, store, self.options, self.on_record).await
            }
            IngestSource::Oreilly => {
                ingest_csv(reader, self.label, store, self.options, self.on_record).await
            }
        }
    }
}

/// Render the run summary printed on stdout.
pub fn format_summary(source: IngestSource, summary: &IngestSummary, dry_run: bool) -> String {
    let mut out = String::new();
    if dry_run {
        let _ = writeln!(out, "ingest {} (dry run, nothing written)", source.as_str());
    } else {
        let _ = writeln!(out, "ingest {}", source.as_str());
    }
    let _ = writeln!(out, "  annotations inserted: {}", summary.annotations_inserted);
    let _ = writeln!(out, "  annotations updated: {}", summary.annotations_updated);
    let _ = writeln!(out, "  failed: {}", summary.failed);
    let _ = writeln!(out, "  empty skipped: {}", summary.empty_skipped);
    let _ = writeln!(out, "  books inserted: {}", summary.books_inserted);
    let _ = writeln!(out, "  books updated: {}", summary.books_updated);
    let _ = writeln!(out, "ok");
    out
}
