//! Ingestion drivers.
//!
//! Each driver runs one full pass over an input stream:
//!
//! ```text
//! bytes ─▶ RecordSplitter / CsvRecords ─▶ parser ─▶ Reconciler ─▶ Store
//! ```
//!
//! Records are processed strictly one at a time. Parse errors abort the
//! run and are returned to the caller; persistence errors on a single
//! record are counted by the [`Reconciler`] and the run continues.

use std::io::Read;
use std::time::Instant;

use tracing::info;

use crate::clippings::ClippingsParser;
use crate::csv_format::CsvRecords;
use crate::error::Result;
use crate::merge::LocationMergePolicy;
use crate::reconcile::{IngestSummary, Reconciler};
use crate::splitter::{RecordSplitter, DEFAULT_MAX_RECORD_BYTES, DEFAULT_READ_BUFFER_BYTES};
use crate::store::Store;

/// Knobs shared by all drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    pub max_record_bytes: usize,
    pub read_buffer_bytes: usize,
    pub location_merge: LocationMergePolicy,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
            read_buffer_bytes: DEFAULT_READ_BUFFER_BYTES,
            location_merge: LocationMergePolicy::default(),
        }
    }
}

/// Ingest a sentinel-delimited clippings stream.
///
/// `origin` is stored verbatim on every annotation. `on_record` is called
/// with the number of each record after it has been handled.
pub async fn ingest_clippings<R, S>(
    reader: R,
    origin: &str,
    store: &S,
    options: &IngestOptions,
    on_record: &dyn Fn(usize),
) -> Result<IngestSummary>
where
    R: Read,
    S: Store + ?Sized,
{
    let begin = Instant::now();
    let parser = ClippingsParser::new(origin);
    let mut reconciler = Reconciler::new(store, options.location_merge);
    let splitter =
        RecordSplitter::with_limits(reader, options.read_buffer_bytes, options.max_record_bytes);

    for block in splitter {
        let block = block?;
        match parser.parse_block(block.number, &block.text)? {
            Some(parsed) => reconciler.reconcile(block.number, &parsed).await,
            None => reconciler.skip_empty(),
        }
        on_record(block.number);
    }

    let summary = reconciler.finish();
    log_completion(origin, begin, &summary);
    Ok(summary)
}

/// Ingest a CSV export. The header is validated before any row is read.
///
/// The origin of every annotation is its row's book URL; `label` is only
/// used in the completion log.
pub async fn ingest_csv<R, S>(
    reader: R,
    label: &str,
    store: &S,
    options: &IngestOptions,
    on_record: &dyn Fn(usize),
) -> Result<IngestSummary>
where
    R: Read,
    S: Store + ?Sized,
{
    let begin = Instant::now();
    let rows = CsvRecords::new(reader)?;
    info!(schema = ?rows.schema(), "recognized CSV export");
    let mut reconciler = Reconciler::new(store, options.location_merge);

    for (i, row) in rows.enumerate() {
        let parsed = row?;
        reconciler.reconcile(i + 1, &parsed).await;
        on_record(i + 1);
    }

    let summary = reconciler.finish();
    log_completion(label, begin, &summary);
    Ok(summary)
}

fn log_completion(origin: &str, begin: Instant, summary: &IngestSummary) {
    info!(
        "ingestion completed from origin {} in {}ms; updated {} annotations and created {} new ones",
        origin,
        begin.elapsed().as_millis(),
        summary.annotations_updated,
        summary.annotations_inserted
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;
    use crate::models::AnnotationType;
    use crate::store::memory::InMemoryStore;
    use std::cell::Cell;

    const CLIPPINGS: &str = "\u{feff}Effective Go (John Doe)\r\n\
        - Your Highlight on Page 12 | Added on Monday, January 2, 2017 3:04 PM\r\n\
        \r\n\
        Sample highlighted text\r\n\
        ==========\r\n\
        \u{feff}Effective Go (John Doe)\r\n\
        - Your Bookmark on Page 14 | Added on Monday, January 2, 2017 3:10 PM\r\n\
        \r\n\
        \r\n\
        ==========\r\n\
        \u{feff}Effective Go (John Doe)\r\n\
        - Your Note on Page 12 | Added on Monday, January 2, 2017 3:05 PM\r\n\
        \r\n\
        Remember this\r\n\
        ==========\r\n";

    fn noop(_: usize) {}

    #[tokio::test]
    async fn test_ingest_sample_clippings() {
        let store = InMemoryStore::new();
        let summary = ingest_clippings(
            CLIPPINGS.as_bytes(),
            "My Clippings.txt",
            &store,
            &IngestOptions::default(),
            &noop,
        )
        .await
        .unwrap();

        assert_eq!(summary.annotations_inserted, 2);
        assert_eq!(summary.annotations_updated, 0);
        assert_eq!(summary.empty_skipped, 1);
        assert_eq!(summary.books_inserted, 1);
        assert_eq!(summary.book_cache_hits, 1);

        let books = store.books();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].name, "Effective Go");
        assert_eq!(books[0].authors, "John Doe");

        let annotations = store.annotations();
        assert_eq!(annotations[0].text, "Sample highlighted text");
        assert_eq!(annotations[0].kind, Some(AnnotationType::Highlight));
        assert_eq!(annotations[0].location.page_start, Some(12));
        assert_eq!(annotations[0].origin, "My Clippings.txt");
        assert_eq!(annotations[1].kind, Some(AnnotationType::Note));
    }

    #[tokio::test]
    async fn test_reingest_is_idempotent() {
        let store = InMemoryStore::new();
        let options = IngestOptions::default();
        ingest_clippings(CLIPPINGS.as_bytes(), "a", &store, &options, &noop)
            .await
            .unwrap();
        let second = ingest_clippings(CLIPPINGS.as_bytes(), "a", &store, &options, &noop)
            .await
            .unwrap();

        assert_eq!(second.annotations_inserted, 0);
        assert_eq!(second.annotations_updated, 2);
        assert_eq!(second.books_inserted, 0);
        assert_eq!(second.books_updated, 1);
        assert_eq!(store.books().len(), 1);
        assert_eq!(store.annotations().len(), 2);
    }

    #[tokio::test]
    async fn test_parse_error_aborts_run() {
        let input = "Good (A)\n- Your Highlight on Page 1 | Added on Monday, January 2, 2017 3:04 PM\n\nfirst\n==========\n\
                     Bad (B)\n- Your Highlight on Page 2 | Added on someday\n\nsecond\n==========\n\
                     Never (C)\n- Your Highlight on Page 3 | Added on Monday, January 2, 2017 3:04 PM\n\nthird\n==========\n";
        let store = InMemoryStore::new();
        let err = ingest_clippings(
            input.as_bytes(),
            "x",
            &store,
            &IngestOptions::default(),
            &noop,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            IngestError::TimestampUnparseable { record: 2, .. }
        ));
        assert_eq!(store.annotations().len(), 1);
    }

    #[tokio::test]
    async fn test_progress_callback_sees_every_record() {
        let seen = Cell::new(0);
        let store = InMemoryStore::new();
        ingest_clippings(
            CLIPPINGS.as_bytes(),
            "x",
            &store,
            &IngestOptions::default(),
            &|n| seen.set(n),
        )
        .await
        .unwrap();
        assert_eq!(seen.get(), 3);
    }

    #[tokio::test]
    async fn test_csv_rows_share_one_book() {
        let input = "Book Title,Chapter Title,Date of Highlight,Book URL,Chapter URL,Annotation URL,Highlight,Personal Note\n\
            Programming Rust,Ch1,2021-03-04,https://learning.oreilly.com/library/view/-/9781492052586/,c1,a1,first,\n\
            Programming Rust,Ch2,2021-03-05,https://learning.oreilly.com/library/view/-/9781492052586/,c2,a2,second,\n";
        let store = InMemoryStore::new();
        let summary = ingest_csv(
            input.as_bytes(),
            "oreilly",
            &store,
            &IngestOptions::default(),
            &noop,
        )
        .await
        .unwrap();
        assert_eq!(summary.annotations_inserted, 2);
        assert_eq!(summary.book_cache_hits, 1);
        assert_eq!(store.books().len(), 1);
        assert_eq!(store.books()[0].isbn, "9781492052586");
    }

    #[tokio::test]
    async fn test_csv_unknown_header_writes_nothing() {
        let input = "Title,Text\nProgramming Rust,first\n";
        let store = InMemoryStore::new();
        let err = ingest_csv(
            input.as_bytes(),
            "oreilly",
            &store,
            &IngestOptions::default(),
            &noop,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedCsvFormat { .. }));
        assert!(store.books().is_empty());
        assert!(store.annotations().is_empty());
    }

    #[tokio::test]
    async fn test_fill_missing_policy_keeps_location() {
        let with_location = "Dune (Frank Herbert)\n- Your Highlight on Page 7 | Added on Monday, January 2, 2017 3:04 PM\n\nspice\n";
        let without_location = "Dune (Frank Herbert)\n- Your Highlight | Added on Monday, January 2, 2017 3:04 PM\n\nspice\n";

        for (policy, expect_page) in [
            (LocationMergePolicy::Legacy, None),
            (LocationMergePolicy::FillMissing, Some(7)),
        ] {
            let store = InMemoryStore::new();
            let options = IngestOptions {
                location_merge: policy,
                ..Default::default()
            };
            ingest_clippings(with_location.as_bytes(), "x", &store, &options, &noop)
                .await
                .unwrap();
            ingest_clippings(without_location.as_bytes(), "x", &store, &options, &noop)
                .await
                .unwrap();
            assert_eq!(
                store.annotations()[0].location.page_start,
                expect_page,
                "policy {}",
                policy
            );
        }
    }

    /// Store whose every write fails.
    struct ReadOnlyStore;

    #[async_trait::async_trait]
    impl Store for ReadOnlyStore {
        async fn upsert_book(
            &self,
            _draft: &crate::models::BookDraft,
        ) -> anyhow::Result<crate::models::Upserted<crate::models::Book>> {
            anyhow::bail!("attempt to write a readonly database")
        }

        async fn upsert_annotation(
            &self,
            _book_id: i64,
            _draft: &crate::models::AnnotationDraft,
            _policy: LocationMergePolicy,
        ) -> anyhow::Result<crate::models::Upserted<crate::models::Annotation>> {
            anyhow::bail!("attempt to write a readonly database")
        }
    }

    #[tokio::test]
    async fn test_store_failures_are_counted_not_returned() {
        let summary = ingest_clippings(
            CLIPPINGS.as_bytes(),
            "a",
            &ReadOnlyStore,
            &IngestOptions::default(),
            &noop,
        )
        .await
        .unwrap();

        assert_eq!(summary.failed, 2);
        assert_eq!(summary.empty_skipped, 1);
        assert_eq!(summary.annotations_inserted, 0);
        assert_eq!(summary.books_inserted, 0);
    }
}
