//! SQLite-backed [`ExposureStore`].
//!
//! One row per user in `user_progress`; the full record is serialized as
//! a JSON document in the `record` column, so a save is a single upsert
//! and the whole record is the unit of consistency. Readers never observe
//! a partially-updated record.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::models::UserExposureRecord;
use crate::store::{ExposureStore, StoreError};

pub struct SqliteExposureStore {
    pool: SqlitePool,
}

impl SqliteExposureStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExposureStore for SqliteExposureStore {
    async fn load(&self, user_id: &str) -> Result<Option<UserExposureRecord>, StoreError> {
        let row: Option<String> =
            sqlx::query_scalar("SELECT record FROM user_progress WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, user_id: &str, record: &UserExposureRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO user_progress (user_id, record, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                record = excluded.record,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(&json)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT user_id FROM user_progress ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get("user_id")).collect())
    }
}
