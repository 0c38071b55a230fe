//! # Annotation Harness Core
//!
//! Runtime-free logic for Annotation Harness: data models, the clipping
//! record splitter and grammars, CSV schema detection, merge rules,
//! reconciliation, and the store abstraction.
//!
//! This crate contains no tokio, sqlx, or other runtime-specific
//! dependencies. Storage is reached only through [`store::Store`].

pub mod clippings;
pub mod csv_format;
pub mod error;
pub mod grammar;
pub mod ingest;
pub mod merge;
pub mod models;
pub mod reconcile;
pub mod splitter;
pub mod store;
