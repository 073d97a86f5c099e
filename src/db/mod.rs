pub mod models;
pub mod status_service;

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

/// Opens the status database, creating the file and schema when absent.
///
/// The pool is capped at a single connection so every statement, reads and
/// the end-of-run commit alike, serializes through one writer. Schema
/// initialization is idempotent.
pub async fn open_store(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS status (
            id INTEGER PRIMARY KEY,
            kind TEXT NOT NULL,
            address TEXT NOT NULL,
            down INTEGER NOT NULL,
            UNIQUE(kind, address)
        )",
    )
    .execute(&pool)
    .await?;
    Ok(pool)
}
