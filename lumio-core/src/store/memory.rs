//! In-memory progress store for tests and local development.

use async_trait::async_trait;
use dashmap::DashMap;

use lumio_model::{ProgressKey, ProgressRecord, UserId, VideoId};

use super::{ProgressStore, StoreError};

/// Map-backed store with the same replace-by-key semantics as the real
/// service.
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    records: DashMap<ProgressKey, ProgressRecord>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Direct read for assertions, bypassing the async port.
    pub fn get(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Option<ProgressRecord> {
        self.records
            .get(&ProgressKey { user_id, video_id })
            .map(|entry| entry.clone())
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn load(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<Option<ProgressRecord>, StoreError> {
        Ok(self.get(user_id, video_id))
    }

    async fn upsert(&self, record: &ProgressRecord) -> Result<(), StoreError> {
        self.records.insert(record.key(), record.clone());
        Ok(())
    }
}
