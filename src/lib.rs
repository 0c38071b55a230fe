//! # Annotation Harness
//!
//! Ingests reading annotations into a local SQLite store.
//!
//! Two sources are supported: the plain-text clippings file written by
//! Kindle devices, and the highlights CSV exported by O'Reilly. Repeated
//! imports are idempotent: a book or annotation seen again is merged into
//! the stored row instead of duplicated.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌────────────┐   ┌──────────┐
//! │ Clippings /  │──▶│  Splitter +  │──▶│ Reconciler │──▶│  SQLite  │
//! │  CSV export  │   │   Parsers    │   │ + BookCache│   │  (sqlx)  │
//! └──────────────┘   └──────────────┘   └────────────┘   └──────────┘
//! ```
//!
//! Parsing and reconciliation live in `annotation-harness-core`; this crate
//! adds configuration, the SQLite store, and the `annot` commands.
//!
//! ## Quick Start
//!
//! ```bash
//! annot init
//! annot ingest kindle --input "My Clippings.txt"
//! annot ingest oreilly --input safari-annotations-export.csv
//! annot stats
//! annot export --output annotations.json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite implementation of the core `Store` trait |
//! | [`ingest`] | `annot ingest` command |
//! | [`stats`] | `annot stats` command |
//! | [`export`] | `annot export` command |
//! | [`progress`] | Progress reporting on stderr |
//! | [`logging`] | Tracing subscriber setup |

pub mod config;
pub mod db;
pub mod export;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod progress;
pub mod sqlite_store;
pub mod stats;
