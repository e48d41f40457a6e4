//! Result store: the key-value sink for job outcomes.
//!
//! One record per job id, overwritten on every write (last write wins). A
//! store handle is opened once per process and shared by every job.

use std::sync::Arc;

use async_trait::async_trait;

use queryjob_core::{JobId, StoredResult};

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis_hash;

pub use in_memory::InMemoryResultStore;
#[cfg(feature = "redis")]
pub use redis_hash::RedisResultStore;

/// Failure writing a result record.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PersistError {
    #[error("result store unavailable: {0}")]
    Unavailable(String),
    #[error("result store rejected write: {0}")]
    Rejected(String),
}

/// Put-by-key sink for [`StoredResult`] records.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Write `record`, replacing any prior record with the same id.
    async fn put(&self, record: &StoredResult) -> Result<(), PersistError>;

    /// Write `payload` as the result of job `id`.
    async fn persist(&self, id: &JobId, payload: &str) -> Result<(), PersistError> {
        self.put(&StoredResult::new(id.clone(), payload)).await
    }
}

#[async_trait]
impl<S> ResultStore for Arc<S>
where
    S: ResultStore + ?Sized,
{
    async fn put(&self, record: &StoredResult) -> Result<(), PersistError> {
        (**self).put(record).await
    }
}
