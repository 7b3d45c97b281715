//! Database statistics and health overview.
//!
//! Provides a quick summary of what's tracked: user counts, registered
//! files, and per-user exposure breakdowns. Used by `zi stats` to give
//! confidence that tracking calls are landing as expected.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;
use crate::models::UserExposureRecord;

/// Per-user breakdown of exposure counts.
struct UserStats {
    user_id: String,
    chars_seen: usize,
    words_seen: usize,
    sessions: usize,
    last_session_ts: Option<i64>,
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_progress")
        .fetch_one(&pool)
        .await?;

    let total_files: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files")
        .fetch_one(&pool)
        .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    let rows = sqlx::query("SELECT user_id, record FROM user_progress ORDER BY rowid")
        .fetch_all(&pool)
        .await?;

    let mut user_stats: Vec<UserStats> = Vec::new();
    let mut total_sessions = 0usize;
    let mut total_chars = 0usize;
    let mut total_words = 0usize;

    for row in &rows {
        let user_id: String = row.get("user_id");
        let json: String = row.get("record");
        let record: UserExposureRecord = serde_json::from_str(&json)?;

        total_sessions += record.learning_sessions.len();
        total_chars += record.character_exposure.len();
        total_words += record.word_exposure.len();

        user_stats.push(UserStats {
            user_id,
            chars_seen: record.character_exposure.len(),
            words_seen: record.word_exposure.len(),
            sessions: record.learning_sessions.len(),
            last_session_ts: record
                .learning_sessions
                .last()
                .map(|s| s.timestamp.timestamp()),
        });
    }

    println!("Zici — Database Stats");
    println!("=====================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Users:       {}", total_users);
    println!("  Files:       {}", total_files);
    println!("  Sessions:    {}", total_sessions);
    println!("  Characters:  {}", total_chars);
    println!("  Words:       {}", total_words);

    if !user_stats.is_empty() {
        println!();
        println!("  By user:");
        println!(
            "  {:<24} {:>6} {:>6} {:>9}   {}",
            "USER", "CHARS", "WORDS", "SESSIONS", "LAST SESSION"
        );
        println!("  {}", "-".repeat(72));

        for s in &user_stats {
            let session_display = match s.last_session_ts {
                Some(ts) => format_ts_relative(ts),
                None => "never".to_string(),
            };
            println!(
                "  {:<24} {:>6} {:>6} {:>9}   {}",
                s.user_id, s.chars_seen, s.words_seen, s.sessions, session_display
            );
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

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
