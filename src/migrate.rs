use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // One row per user; the full exposure record lives in `record` as JSON.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_progress (
            user_id TEXT PRIMARY KEY,
            record TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // One row per registered file, keyed by content-hash-deduped file id.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS files (
            file_id TEXT PRIMARY KEY,
            file_hash TEXT NOT NULL UNIQUE,
            record TEXT NOT NULL,
            last_accessed INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_files_last_accessed ON files(last_accessed DESC)")
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}
