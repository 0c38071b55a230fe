//! Export the store as JSON.
//!
//! Produces one document listing every book with its annotations nested
//! under it, ordered by id. Locations and annotation types use the same
//! JSON form as the `annotations.location` column.

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use std::path::Path;

use annotation_harness_core::models::{Annotation, Book};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::annotation_from_row;

#[derive(Debug, Serialize)]
pub struct ExportData {
    pub books: Vec<ExportBook>,
}

#[derive(Debug, Serialize)]
pub struct ExportBook {
    #[serde(flatten)]
    pub book: Book,
    pub annotations: Vec<Annotation>,
}

/// Load every book with its annotations.
pub async fn collect_export(pool: &SqlitePool) -> Result<ExportData> {
    let book_rows = sqlx::query("SELECT id, isbn, name, authors FROM books ORDER BY id")
        .fetch_all(pool)
        .await?;
    let annotation_rows = sqlx::query(
        "SELECT id, book_id, text, location, ts, origin, type FROM annotations ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    let mut by_book: BTreeMap<i64, Vec<Annotation>> = BTreeMap::new();
    for row in &annotation_rows {
        let annotation = annotation_from_row(row)?;
        by_book.entry(annotation.book_id).or_default().push(annotation);
    }

    let books = book_rows
        .iter()
        .map(|row| {
            let book = Book {
                id: row.get("id"),
                isbn: row.get("isbn"),
                name: row.get("name"),
                authors: row.get("authors"),
            };
            let annotations = by_book.remove(&book.id).unwrap_or_default();
            ExportBook { book, annotations }
        })
        .collect();

    Ok(ExportData { books })
}

/// Export books and annotations as JSON.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub async fn run_export(config: &Config, output: Option<&Path>) -> Result<()> {
    let pool = db::connect(config).await?;
    let data = collect_export(&pool).await?;
    let book_count = data.books.len();
    let annotation_count: usize = data.books.iter().map(|b| b.annotations.len()).sum();
    let json = serde_json::to_string_pretty(&data)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &json)?;
            eprintln!(
                "Exported {} books, {} annotations to {}",
                book_count,
                annotation_count,
                path.display()
            );
        }
        None => {
            println!("{}", json);
        }
    }

    pool.close().await;
    Ok(())
}
