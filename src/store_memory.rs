//! In-memory [`ExposureStore`] implementation for tests and embedding.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`; records are cloned on the
//! way in and out so callers never observe shared mutation. `list_users`
//! returns ids in first-save order.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::models::UserExposureRecord;
use crate::store::{ExposureStore, StoreError};

/// In-memory store. Cheap to construct, nothing survives the process.
pub struct MemoryExposureStore {
    records: RwLock<HashMap<String, UserExposureRecord>>,
    insertion_order: RwLock<Vec<String>>,
}

impl MemoryExposureStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            insertion_order: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryExposureStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExposureStore for MemoryExposureStore {
    async fn load(&self, user_id: &str) -> Result<Option<UserExposureRecord>, StoreError> {
        let records = self.records.read().unwrap();
        Ok(records.get(user_id).cloned())
    }

    async fn save(&self, user_id: &str, record: &UserExposureRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().unwrap();
        if records.insert(user_id.to_string(), record.clone()).is_none() {
            self.insertion_order
                .write()
                .unwrap()
                .push(user_id.to_string());
        }
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.insertion_order.read().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_missing_user_is_none() {
        let store = MemoryExposureStore::new();
        assert!(store.load("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let store = MemoryExposureStore::new();
        let mut record = UserExposureRecord::new("u1");
        record.total_exposures = 3;
        store.save("u1", &record).await.unwrap();

        let loaded = store.load("u1").await.unwrap().unwrap();
        assert_eq!(loaded.user_id, "u1");
        assert_eq!(loaded.total_exposures, 3);
    }

    #[tokio::test]
    async fn test_list_users_in_first_save_order() {
        let store = MemoryExposureStore::new();
        for user in ["b", "a", "c"] {
            store
                .save(user, &UserExposureRecord::new(user))
                .await
                .unwrap();
        }
        // Resaving must not duplicate or reorder.
        store.save("a", &UserExposureRecord::new("a")).await.unwrap();
        assert_eq!(store.list_users().await.unwrap(), ["b", "a", "c"]);
    }
}
