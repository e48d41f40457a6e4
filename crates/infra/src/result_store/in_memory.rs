use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use queryjob_core::{JobId, StoredResult};

use super::{PersistError, ResultStore};

/// In-memory result store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryResultStore {
    records: RwLock<HashMap<JobId, StoredResult>>,
    writes: AtomicUsize,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &JobId) -> Option<StoredResult> {
        self.records.read().ok()?.get(id).cloned()
    }

    /// Payload currently stored for `id`.
    pub fn payload(&self, id: &str) -> Option<String> {
        self.get(&JobId::from(id)).map(|r| r.payload)
    }

    /// Number of distinct ids with a record.
    pub fn len(&self) -> usize {
        self.records.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of successful `put` calls, including overwrites.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn put(&self, record: &StoredResult) -> Result<(), PersistError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| PersistError::Unavailable("result map lock poisoned".to_string()))?;
        records.insert(record.id.clone(), record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_overwrites_by_id() {
        let store = InMemoryResultStore::new();
        store
            .put(&StoredResult::new(JobId::new("1"), "first"))
            .await
            .unwrap();
        store
            .put(&StoredResult::new(JobId::new("1"), "second"))
            .await
            .unwrap();
        store
            .put(&StoredResult::new(JobId::new("2"), "other"))
            .await
            .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.writes(), 3);
        assert_eq!(store.payload("1").as_deref(), Some("second"));
        assert_eq!(store.payload("2").as_deref(), Some("other"));
        assert_eq!(store.payload("3"), None);
    }

    #[tokio::test]
    async fn persist_writes_an_id_and_result_record() {
        let store = InMemoryResultStore::new();
        store.persist(&JobId::new("9"), "[]").await.unwrap();

        assert_eq!(
            store.get(&JobId::new("9")),
            Some(StoredResult::new(JobId::new("9"), "[]"))
        );
    }
}
