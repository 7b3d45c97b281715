//! File registry: content-hash deduplication of uploaded documents.
//!
//! Every analysis event references a `file_id` issued here. Identical
//! bytes uploaded twice (same book, different user or session) resolve to
//! one id, so exposure statistics that count distinct files stay honest.
//! Each file also carries a short, capped analysis history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::store::StoreError;

/// Analysis records retained per file, oldest evicted first.
const ANALYSIS_HISTORY_CAP: usize = 20;

/// One analysis pass over a file, as recorded in its history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub analysis_id: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub characters_encountered: usize,
    pub words_encountered: usize,
}

/// Full registry entry for one deduplicated file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_id: String,
    pub filename: String,
    pub file_hash: String,
    pub file_size: u64,
    pub file_type: Option<String>,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u64,
    /// Insertion-ordered set of users who uploaded or re-uploaded this file.
    pub accessed_by: Vec<String>,
    pub analysis_history: Vec<AnalysisRecord>,
}

/// Content-addressed file registry backed by the `files` table.
pub struct FileRegistry {
    pool: SqlitePool,
}

impl FileRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register file content, returning its id. Re-registering identical
    /// bytes returns the existing id and bumps the access counters.
    pub async fn register_file(
        &self,
        filename: &str,
        content: &[u8],
        user_id: &str,
        file_type: Option<&str>,
    ) -> Result<String, StoreError> {
        let file_hash = content_hash(content);
        let now = Utc::now();

        if let Some(mut existing) = self.load_by_hash(&file_hash).await? {
            existing.last_accessed = now;
            existing.access_count += 1;
            if !existing.accessed_by.iter().any(|u| u == user_id) {
                existing.accessed_by.push(user_id.to_string());
            }
            self.save(&existing).await?;
            return Ok(existing.file_id);
        }

        let record = FileRecord {
            file_id: Uuid::new_v4().simple().to_string()[..12].to_string(),
            filename: filename.to_string(),
            file_hash,
            file_size: content.len() as u64,
            file_type: file_type.map(|t| t.to_string()),
            uploaded_by: user_id.to_string(),
            uploaded_at: now,
            last_accessed: now,
            access_count: 1,
            accessed_by: vec![user_id.to_string()],
            analysis_history: Vec::new(),
        };
        self.save(&record).await?;
        Ok(record.file_id)
    }

    /// Append an analysis record to a file's history. Returns `false` if
    /// the file id is unknown.
    pub async fn add_analysis_record(
        &self,
        file_id: &str,
        analysis: AnalysisRecord,
    ) -> Result<bool, StoreError> {
        let mut record = match self.get_file_info(file_id).await? {
            Some(r) => r,
            None => return Ok(false),
        };

        record.analysis_history.push(analysis);
        if record.analysis_history.len() > ANALYSIS_HISTORY_CAP {
            let excess = record.analysis_history.len() - ANALYSIS_HISTORY_CAP;
            record.analysis_history.drain(..excess);
        }
        record.last_accessed = Utc::now();
        self.save(&record).await?;
        Ok(true)
    }

    pub async fn get_file_info(&self, file_id: &str) -> Result<Option<FileRecord>, StoreError> {
        let row: Option<String> = sqlx::query_scalar("SELECT record FROM files WHERE file_id = ?")
            .bind(file_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// All files a user has uploaded or re-uploaded, most recently
    /// accessed first.
    pub async fn get_user_files(&self, user_id: &str) -> Result<Vec<FileRecord>, StoreError> {
        let rows = sqlx::query("SELECT record FROM files ORDER BY last_accessed DESC")
            .fetch_all(&self.pool)
            .await?;

        let mut files = Vec::new();
        for row in rows {
            let json: String = row.get("record");
            let record: FileRecord = serde_json::from_str(&json)?;
            if record.accessed_by.iter().any(|u| u == user_id) {
                files.push(record);
            }
        }
        Ok(files)
    }

    /// A file's analysis history, most recent first, optionally filtered
    /// to one user.
    pub async fn get_file_analysis_history(
        &self,
        file_id: &str,
        user_id: Option<&str>,
    ) -> Result<Vec<AnalysisRecord>, StoreError> {
        let record = match self.get_file_info(file_id).await? {
            Some(r) => r,
            None => return Ok(Vec::new()),
        };

        let mut history: Vec<AnalysisRecord> = record
            .analysis_history
            .into_iter()
            .filter(|a| user_id.map_or(true, |u| a.user_id == u))
            .collect();
        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(history)
    }

    pub async fn count_files(&self) -> Result<i64, StoreError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM files")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn load_by_hash(&self, file_hash: &str) -> Result<Option<FileRecord>, StoreError> {
        let row: Option<String> = sqlx::query_scalar("SELECT record FROM files WHERE file_hash = ?")
            .bind(file_hash)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, record: &FileRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        sqlx::query(
            r#"
            INSERT INTO files (file_id, file_hash, record, last_accessed) VALUES (?, ?, ?, ?)
            ON CONFLICT(file_id) DO UPDATE SET
                record = excluded.record,
                last_accessed = excluded.last_accessed
            "#,
        )
        .bind(&record.file_id)
        .bind(&record.file_hash)
        .bind(&json)
        .bind(record.last_accessed.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Short content hash used for dedup: first 16 hex chars of SHA-256.
fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())[..16].to_string()
}
