use anyhow::Result;
use sqlx::{SqliteConnection, SqlitePool};

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes. Safe to run on every connection.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    let mut conn = pool.acquire().await?;
    create_tables(&mut conn).await
}

/// Schema statements on a single connection. A dry run issues them inside
/// its transaction so they roll back with everything else.
pub async fn create_tables(conn: &mut SqliteConnection) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS books (
            id INTEGER PRIMARY KEY,
            isbn TEXT NOT NULL DEFAULT '',
            name TEXT NOT NULL DEFAULT '',
            authors TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    // location is JSON with camelCase keys; ts is Unix seconds
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS annotations (
            id INTEGER PRIMARY KEY,
            book_id INTEGER NOT NULL,
            text TEXT NOT NULL,
            location TEXT NOT NULL DEFAULT '{}',
            ts INTEGER,
            origin TEXT NOT NULL DEFAULT '',
            type TEXT NOT NULL DEFAULT '',
            FOREIGN KEY (book_id) REFERENCES books(id)
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_books_name ON books(name)")
        .execute(&mut *conn)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_books_isbn ON books(isbn)")
        .execute(&mut *conn)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_annotations_book_text ON annotations(book_id, text)",
    )
    .execute(&mut *conn)
    .await?;

    Ok(())
}
