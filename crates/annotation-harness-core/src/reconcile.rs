//! Reconciliation of parsed records against the store.
//!
//! A [`Reconciler`] lives for exactly one ingestion call. It owns:
//!
//! - a [`BookCache`] keyed by `"{isbn}/{name}"`, so that a book seen many
//!   times in one export is written once;
//! - the [`IngestSummary`] counters reported at the end of the run.
//!
//! Books are always upserted before their annotation. A persistence error
//! on either upsert is logged and counted as `failed`; the run continues
//! with the next record.

use std::collections::HashMap;

use anyhow::Result;
use tracing::{debug, error};

use crate::merge::LocationMergePolicy;
use crate::models::{Book, BookDraft, ParsedRecord, Upserted};
use crate::store::Store;

/// Per-run cache of books confirmed by the store.
///
/// Only successful upserts are cached. The cache is an optimization and is
/// dropped with its [`Reconciler`].
#[derive(Debug, Default)]
pub struct BookCache {
    books: HashMap<String, Book>,
}

impl BookCache {
    pub fn get(&self, draft: &BookDraft) -> Option<&Book> {
        self.books.get(&draft.cache_key())
    }

    /// Remember `book` under the key of the draft that produced it and
    /// under its own merged key.
    fn remember(&mut self, draft: &BookDraft, book: &Book) {
        let merged_key = book.cache_key();
        let draft_key = draft.cache_key();
        if merged_key != draft_key {
            self.books.insert(merged_key, book.clone());
        }
        self.books.insert(draft_key, book.clone());
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

/// Counters reported when an ingestion run completes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub annotations_inserted: u64,
    pub annotations_updated: u64,
    /// Records whose book or annotation upsert failed in the store.
    pub failed: u64,
    /// Bookmark-style blocks without a body.
    pub empty_skipped: u64,
    pub books_inserted: u64,
    pub books_updated: u64,
    pub book_cache_hits: u64,
}

/// Reconciles parsed records against a [`Store`] for one ingestion run.
pub struct Reconciler<'a, S: Store + ?Sized> {
    store: &'a S,
    policy: LocationMergePolicy,
    cache: BookCache,
    summary: IngestSummary,
}

impl<'a, S: Store + ?Sized> Reconciler<'a, S> {
    pub fn new(store: &'a S, policy: LocationMergePolicy) -> Self {
        Self {
            store,
            policy,
            cache: BookCache::default(),
            summary: IngestSummary::default(),
        }
    }

    /// Resolve a book draft to a stored book, consulting the cache first.
    ///
    /// A cache hit reports `existed = true` without touching the store.
    pub async fn upsert_book(&mut self, draft: &BookDraft) -> Result<Upserted<Book>> {
        if let Some(cached) = self.cache.get(draft) {
            debug!(book_id = cached.id, "skipping book update for {:?}", draft.name);
            self.summary.book_cache_hits += 1;
            return Ok(Upserted {
                existed: true,
                record: cached.clone(),
            });
        }
        let upserted = self.store.upsert_book(draft).await?;
        if upserted.existed {
            debug!(book_id = upserted.record.id, "updated existing book");
            self.summary.books_updated += 1;
        } else {
            debug!(book_id = upserted.record.id, "inserted new book");
            self.summary.books_inserted += 1;
        }
        self.cache.remember(draft, &upserted.record);
        Ok(upserted)
    }

    /// Reconcile one parsed record: book first, then its annotation.
    pub async fn reconcile(&mut self, record: usize, parsed: &ParsedRecord) {
        let book = match self.upsert_book(&parsed.book).await {
            Ok(upserted) => upserted.record,
            Err(e) => {
                error!(record, "failed to upsert a book: {:#}", e);
                self.summary.failed += 1;
                return;
            }
        };

        match self
            .store
            .upsert_annotation(book.id, &parsed.annotation, self.policy)
            .await
        {
            Ok(upserted) if upserted.existed => {
                debug!(record, annotation_id = upserted.record.id, "updated existing annotation");
                self.summary.annotations_updated += 1;
            }
            Ok(upserted) => {
                debug!(record, annotation_id = upserted.record.id, "inserted new annotation");
                self.summary.annotations_inserted += 1;
            }
            Err(e) => {
                error!(record, "failed to upsert an annotation: {:#}", e);
                self.summary.failed += 1;
            }
        }
    }

    /// Count a skipped empty annotation block.
    pub fn skip_empty(&mut self) {
        self.summary.empty_skipped += 1;
    }

    pub fn cache(&self) -> &BookCache {
        &self.cache
    }

    pub fn finish(self) -> IngestSummary {
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Annotation, AnnotationDraft};
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store that counts calls and can be told to fail.
    struct CountingStore {
        inner: InMemoryStore,
        book_calls: AtomicUsize,
        fail_books: bool,
        fail_annotations: bool,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: InMemoryStore::new(),
                book_calls: AtomicUsize::new(0),
                fail_books: false,
                fail_annotations: false,
            }
        }
    }

    #[async_trait]
    impl Store for CountingStore {
        async fn upsert_book(&self, draft: &BookDraft) -> Result<Upserted<Book>> {
            self.book_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_books {
                anyhow::bail!("database is locked");
            }
            self.inner.upsert_book(draft).await
        }

        async fn upsert_annotation(
            &self,
            book_id: i64,
            draft: &AnnotationDraft,
            policy: LocationMergePolicy,
        ) -> Result<Upserted<Annotation>> {
            if self.fail_annotations {
                anyhow::bail!("disk I/O error");
            }
            self.inner.upsert_annotation(book_id, draft, policy).await
        }
    }

    fn record(isbn: &str, name: &str, text: &str) -> ParsedRecord {
        ParsedRecord {
            book: BookDraft {
                isbn: isbn.to_string(),
                name: name.to_string(),
                authors: String::new(),
            },
            annotation: AnnotationDraft {
                text: text.to_string(),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_same_book_twice_hits_cache() {
        let store = CountingStore::new();
        let mut rec = Reconciler::new(&store, LocationMergePolicy::Legacy);
        rec.reconcile(1, &record("9781492052586", "Programming Rust", "one"))
            .await;
        rec.reconcile(2, &record("9781492052586", "Programming Rust", "two"))
            .await;

        assert_eq!(store.book_calls.load(Ordering::SeqCst), 1);
        let summary = rec.finish();
        assert_eq!(summary.book_cache_hits, 1);
        assert_eq!(summary.books_inserted, 1);
        assert_eq!(summary.annotations_inserted, 2);

        let annotations = store.inner.annotations();
        assert_eq!(annotations[0].book_id, annotations[1].book_id);
        assert_eq!(store.inner.books().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_book_is_not_cached() {
        let mut store = CountingStore::new();
        store.fail_books = true;
        let mut rec = Reconciler::new(&store, LocationMergePolicy::Legacy);
        rec.reconcile(1, &record("", "Dune", "a")).await;
        rec.reconcile(2, &record("", "Dune", "b")).await;

        assert_eq!(store.book_calls.load(Ordering::SeqCst), 2);
        assert!(rec.cache().is_empty());
        let summary = rec.finish();
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.annotations_inserted, 0);
        assert!(store.inner.annotations().is_empty());
    }

    #[tokio::test]
    async fn test_annotation_failure_is_counted_and_run_continues() {
        let mut store = CountingStore::new();
        store.fail_annotations = true;
        let mut rec = Reconciler::new(&store, LocationMergePolicy::Legacy);
        rec.reconcile(1, &record("", "Dune", "a")).await;
        rec.reconcile(2, &record("", "Dune", "b")).await;
        let summary = rec.finish();
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.annotations_inserted + summary.annotations_updated, 0);
        assert_eq!(summary.books_inserted, 1);
    }

    #[tokio::test]
    async fn test_repeat_annotation_counts_as_update() {
        let store = InMemoryStore::new();
        let mut rec = Reconciler::new(&store, LocationMergePolicy::Legacy);
        rec.reconcile(1, &record("", "Dune", "spice")).await;
        rec.reconcile(2, &record("", "Dune", "spice")).await;
        let summary = rec.finish();
        assert_eq!(summary.annotations_inserted, 1);
        assert_eq!(summary.annotations_updated, 1);
        assert_eq!(store.annotations().len(), 1);
    }

    #[tokio::test]
    async fn test_cache_is_scoped_to_one_reconciler() {
        let store = CountingStore::new();
        for _ in 0..2 {
            let mut rec = Reconciler::new(&store, LocationMergePolicy::Legacy);
            rec.reconcile(1, &record("", "Dune", "spice")).await;
        }
        assert_eq!(store.book_calls.load(Ordering::SeqCst), 2);
    }
}
