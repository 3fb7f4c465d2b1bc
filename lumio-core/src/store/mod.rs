//! Durability boundary for watch progress.
//!
//! The store holds no policy: it loads and atomically replaces
//! [`ProgressRecord`]s by their (user, video) key. Write ordering is the
//! owning session's job; the session never has two upserts in flight for
//! the same key, which is what keeps a late network response from clobbering
//! a newer position with an older one.

pub mod memory;
pub mod rest;

use async_trait::async_trait;

use lumio_model::{ProgressRecord, UserId, VideoId};

pub use memory::MemoryProgressStore;
pub use rest::{RestProgressStore, RestStoreOptions};

/// Store failure taxonomy.
///
/// `Transient` failures are retried naturally by the next autosave tick
/// (the record stays dirty). `Rejected` means the service actively refused
/// the write; retrying would only loop, so the session stops flushing that
/// record and surfaces the failure once.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("transient store failure: {0}")]
    Transient(String),
    #[error("store rejected the write: {0}")]
    Rejected(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// Port to the progress storage service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// The existing record for the key, or `None`. Never fabricates one.
    async fn load(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<Option<ProgressRecord>, StoreError>;

    /// Atomic replace-by-key. Safe to call redundantly with an identical
    /// record: the stored state ends up the same as after one call.
    async fn upsert(&self, record: &ProgressRecord) -> Result<(), StoreError>;
}
