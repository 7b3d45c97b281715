//! Storage abstraction for per-user exposure records.
//!
//! The [`ExposureStore`] trait defines the two operations the tracker and
//! query layers need, enabling pluggable backends (SQLite, in-memory).
//! The whole [`UserExposureRecord`] is the unit of consistency: `save`
//! either persists the full record or leaves the prior state intact —
//! partial-field updates are never observable.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::UserExposureRecord;

/// Failure surfaced by a storage backend. Propagated unchanged to the
/// caller; no retries happen below this boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backing medium unreachable or a write was rejected.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A persisted record failed to encode or decode.
    #[error("record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Abstract keyed storage: one record per `user_id`.
#[async_trait]
pub trait ExposureStore: Send + Sync {
    /// Fetch a user's record, or `None` if the user has never been tracked.
    async fn load(&self, user_id: &str) -> Result<Option<UserExposureRecord>, StoreError>;

    /// Persist the full record, replacing any prior version atomically.
    async fn save(&self, user_id: &str, record: &UserExposureRecord) -> Result<(), StoreError>;

    /// All tracked user ids, in storage order. Used by the stats overview.
    async fn list_users(&self) -> Result<Vec<String>, StoreError>;
}
