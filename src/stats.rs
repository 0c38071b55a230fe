//! Database statistics.
//!
//! Used by `annot stats` to show what has been ingested: book and
//! annotation counts, a per-type breakdown, and the annotation count per
//! origin.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;

/// Row counts gathered from the store.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub books: i64,
    pub annotations: i64,
    /// `(type, count)`, untyped rows reported as `"(none)"`.
    pub by_type: Vec<(String, i64)>,
    /// `(origin, annotation count)`, largest first.
    pub by_origin: Vec<(String, i64)>,
}

/// Query counts from an open pool.
pub async fn collect_stats(pool: &SqlitePool) -> Result<StoreStats> {
    let books: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
        .fetch_one(pool)
        .await?;
    let annotations: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM annotations")
        .fetch_one(pool)
        .await?;

    let by_type: Vec<(String, i64)> = sqlx::query(
        "SELECT type, COUNT(*) AS n FROM annotations GROUP BY type ORDER BY n DESC, type",
    )
    .fetch_all(pool)
    .await?
    .iter()
    .map(|row| {
        let kind: String = row.get("type");
        let kind = if kind.is_empty() {
            "(none)".to_string()
        } else {
            kind
        };
        (kind, row.get::<i64, _>("n"))
    })
    .collect();

    let by_origin: Vec<(String, i64)> = sqlx::query(
        "SELECT origin, COUNT(*) AS n FROM annotations GROUP BY origin ORDER BY n DESC, origin",
    )
    .fetch_all(pool)
    .await?
    .iter()
    .map(|row| (row.get::<String, _>("origin"), row.get::<i64, _>("n")))
    .collect();

    Ok(StoreStats {
        books,
        annotations,
        by_type,
        by_origin,
    })
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let stats = collect_stats(&pool).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Annotation Harness: Database Stats");
    println!("==================================");
    println!();
    println!("  Database:     {}", config.db.path.display());
    println!("  Size:         {}", format_bytes(db_size));
    println!();
    println!("  Books:        {}", stats.books);
    println!("  Annotations:  {}", stats.annotations);

    if !stats.by_type.is_empty() {
        println!();
        println!("  By type:");
        for (kind, n) in &stats.by_type {
            println!("    {:<12} {:>8}", kind, n);
        }
    }

    if !stats.by_origin.is_empty() {
        println!();
        println!("  By origin:");
        println!("  {:<56} {:>8}", "ORIGIN", "COUNT");
        println!("  {}", "-".repeat(65));
        for (origin, n) in &stats.by_origin {
            println!("  {:<56} {:>8}", truncate(origin, 56), n);
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Shorten long origins (CSV book URLs) to fit the table.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let head: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_human_readable() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn long_origins_are_truncated() {
        assert_eq!(truncate("short", 10), "short");
        let long = "https://learning.oreilly.com/library/view/-/9781492052586/";
        let cut = truncate(long, 20);
        assert_eq!(cut.chars().count(), 20);
        assert!(cut.ends_with('…'));
    }
}
