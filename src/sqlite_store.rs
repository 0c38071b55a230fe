//! SQLite-backed [`Store`] implementation.
//!
//! Each upsert runs its identity lookup, merge, and write inside one
//! transaction. Merging uses the same pure functions as the in-memory
//! store, so both backends agree on what a repeated record does.
//!
//! [`DryRunStore`] runs the same statements in a transaction that is
//! rolled back at the end of the run.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tokio::sync::Mutex;

use annotation_harness_core::merge::{merge_annotation, merge_book, LocationMergePolicy};
use annotation_harness_core::models::{
    Annotation, AnnotationDraft, AnnotationType, Book, BookDraft, Location, Upserted,
};
use annotation_harness_core::store::Store;

/// SQLite implementation of the [`Store`] trait over the `books` and
/// `annotations` tables created by [`crate::migrate`].
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn book_from_row(row: &SqliteRow) -> Book {
    Book {
        id: row.get("id"),
        isbn: row.get("isbn"),
        name: row.get("name"),
        authors: row.get("authors"),
    }
}

pub(crate) fn annotation_from_row(row: &SqliteRow) -> Result<Annotation> {
    let id: i64 = row.get("id");
    let location_json: String = row.get("location");
    let location: Location = serde_json::from_str(&location_json)
        .with_context(|| format!("annotation {} has an invalid location: {}", id, location_json))?;
    let ts: Option<i64> = row.get("ts");
    let kind: String = row.get("type");

    Ok(Annotation {
        id,
        book_id: row.get("book_id"),
        text: row.get("text"),
        location,
        timestamp: ts.and_then(|t| DateTime::<Utc>::from_timestamp(t, 0)),
        origin: row.get("origin"),
        kind: kind.parse::<AnnotationType>().ok(),
    })
}

async fn find_book(conn: &mut SqliteConnection, draft: &BookDraft) -> Result<Option<Book>> {
    if !draft.isbn.is_empty() {
        let row = sqlx::query("SELECT id, isbn, name, authors FROM books WHERE isbn = ? LIMIT 1")
            .bind(&draft.isbn)
            .fetch_optional(&mut *conn)
            .await?;
        if let Some(row) = row {
            return Ok(Some(book_from_row(&row)));
        }
    }

    let row = sqlx::query("SELECT id, isbn, name, authors FROM books WHERE name = ? LIMIT 1")
        .bind(&draft.name)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.as_ref().map(book_from_row))
}

async fn find_annotation(
    conn: &mut SqliteConnection,
    book_id: i64,
    text: &str,
) -> Result<Option<Annotation>> {
    let row = sqlx::query(
        "SELECT id, book_id, text, location, ts, origin, type \
         FROM annotations WHERE book_id = ? AND text = ? LIMIT 1",
    )
    .bind(book_id)
    .bind(text)
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(annotation_from_row).transpose()
}

fn kind_column(kind: Option<AnnotationType>) -> &'static str {
    kind.map(|k| k.as_str()).unwrap_or("")
}

async fn upsert_book_on(conn: &mut SqliteConnection, draft: &BookDraft) -> Result<Upserted<Book>> {
    match find_book(&mut *conn, draft).await? {
        Some(existing) => {
            let merged = merge_book(&existing, draft);
            sqlx::query("UPDATE books SET isbn = ?, name = ?, authors = ? WHERE id = ?")
                .bind(&merged.isbn)
                .bind(&merged.name)
                .bind(&merged.authors)
                .bind(merged.id)
                .execute(&mut *conn)
                .await?;
            Ok(Upserted {
                existed: true,
                record: merged,
            })
        }
        None => {
            let id = sqlx::query("INSERT INTO books (isbn, name, authors) VALUES (?, ?, ?)")
                .bind(&draft.isbn)
                .bind(&draft.name)
                .bind(&draft.authors)
                .execute(&mut *conn)
                .await?
                .last_insert_rowid();
            Ok(Upserted {
                existed: false,
                record: Book {
                    id,
                    isbn: draft.isbn.clone(),
                    name: draft.name.clone(),
                    authors: draft.authors.clone(),
                },
            })
        }
    }
}

async fn upsert_annotation_on(
    conn: &mut SqliteConnection,
    book_id: i64,
    draft: &AnnotationDraft,
    policy: LocationMergePolicy,
) -> Result<Upserted<Annotation>> {
    match find_annotation(&mut *conn, book_id, &draft.text).await? {
        Some(existing) => {
            let merged = merge_annotation(&existing, draft, policy);
            sqlx::query(
                "UPDATE annotations SET location = ?, ts = ?, origin = ?, type = ? WHERE id = ?",
            )
            .bind(serde_json::to_string(&merged.location)?)
            .bind(merged.timestamp.map(|t| t.timestamp()))
            .bind(&merged.origin)
            .bind(kind_column(merged.kind))
            .bind(merged.id)
            .execute(&mut *conn)
            .await?;
            Ok(Upserted {
                existed: true,
                record: merged,
            })
        }
        None => {
            let id = sqlx::query(
                "INSERT INTO annotations (book_id, text, location, ts, origin, type) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(book_id)
            .bind(&draft.text)
            .bind(serde_json::to_string(&draft.location)?)
            .bind(draft.timestamp.map(|t| t.timestamp()))
            .bind(&draft.origin)
            .bind(kind_column(draft.kind))
            .execute(&mut *conn)
            .await?
            .last_insert_rowid();
            Ok(Upserted {
                existed: false,
                record: Annotation {
                    id,
                    book_id,
                    text: draft.text.clone(),
                    location: draft.location,
                    timestamp: draft.timestamp,
                    origin: draft.origin.clone(),
                    kind: draft.kind,
                },
            })
        }
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert_book(&self, draft: &BookDraft) -> Result<Upserted<Book>> {
        let mut tx = self.pool.begin().await?;
        let upserted = upsert_book_on(&mut tx, draft).await?;
        tx.commit().await?;
        Ok(upserted)
    }

    async fn upsert_annotation(
        &self,
        book_id: i64,
        draft: &AnnotationDraft,
        policy: LocationMergePolicy,
    ) -> Result<Upserted<Annotation>> {
        let mut tx = self.pool.begin().await?;
        let upserted = upsert_annotation_on(&mut tx, book_id, draft, policy).await?;
        tx.commit().await?;
        Ok(upserted)
    }
}

/// Store for `--dry-run`.
///
/// Every upsert runs against the real database inside one transaction
/// spanning the whole run, so lookups see both stored rows and the rows
/// written earlier in the run. [`DryRunStore::rollback`] discards it all.
pub struct DryRunStore {
    tx: Mutex<Transaction<'static, Sqlite>>,
}

impl DryRunStore {
    /// Open the run transaction and make sure the tables exist inside it.
    pub async fn begin(pool: &SqlitePool) -> Result<Self> {
        let mut tx = pool.begin().await?;
        crate::migrate::create_tables(&mut tx).await?;
        Ok(Self { tx: Mutex::new(tx) })
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.into_inner().rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl Store for DryRunStore {
    async fn upsert_book(&self, draft: &BookDraft) -> Result<Upserted<Book>> {
        let mut tx = self.tx.lock().await;
        upsert_book_on(&mut tx, draft).await
    }

    async fn upsert_annotation(
        &self,
        book_id: i64,
        draft: &AnnotationDraft,
        policy: LocationMergePolicy,
    ) -> Result<Upserted<Annotation>> {
        let mut tx = self.tx.lock().await;
        upsert_annotation_on(&mut tx, book_id, draft, policy).await
    }
}
