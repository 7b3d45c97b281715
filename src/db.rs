//! SQLite connection pool.
//!
//! The store is two small tables holding one JSON document per row, so
//! the pool stays small: WAL lets progress queries read while the
//! tracker upserts, and the busy timeout covers the occasional write
//! collision between a CLI invocation and a running server on the same
//! database file.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::config::Config;

/// Open the configured database, creating the file and any missing
/// parent directories on first use.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        // One writer (the tracker serializes per user anyway) plus a
        // few concurrent progress readers.
        .max_connections(4)
        .connect_with(options)
        .await?;

    Ok(pool)
}
