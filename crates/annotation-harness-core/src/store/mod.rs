//! Persistence boundary for Annotation Harness.
//!
//! The [`Store`] trait is the only contract the reconciliation engine
//! depends on. Implementations own the schema and must run each upsert's
//! identity lookup, merge, and write as one atomic operation (a single
//! transaction for SQL backends).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::merge::LocationMergePolicy;
use crate::models::{Annotation, AnnotationDraft, Book, BookDraft, Upserted};

/// Abstract storage backend for books and annotations.
///
/// # Operations
///
/// | Method | Identity | Merge |
/// |--------|----------|-------|
/// | [`upsert_book`](Store::upsert_book) | non-empty ISBN, else exact name | [`merge_book`](crate::merge::merge_book) |
/// | [`upsert_annotation`](Store::upsert_annotation) | book id + exact text | [`merge_annotation`](crate::merge::merge_annotation) |
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a new book or merge the draft into the matching one.
    ///
    /// Returns the persisted row, including its id, and whether it existed.
    async fn upsert_book(&self, draft: &BookDraft) -> Result<Upserted<Book>>;

    /// Insert a new annotation for `book_id` or merge the draft into the
    /// matching one.
    async fn upsert_annotation(
        &self,
        book_id: i64,
        draft: &AnnotationDraft,
        policy: LocationMergePolicy,
    ) -> Result<Upserted<Annotation>>;
}
