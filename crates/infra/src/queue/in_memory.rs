use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{JobQueue, JobSource, QueueError, QueueMessage, drain_front};

/// In-memory queue for tests/dev.
///
/// Cloning shares the underlying queue, so one clone can publish while another
/// consumes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryJobQueue {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    ready: Mutex<VecDeque<QueueMessage>>,
    acked: Mutex<Vec<String>>,
    next_id: AtomicU64,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an entry that has no body (a malformed transport entry).
    pub fn push_empty(&self) -> String {
        self.push(None)
    }

    /// Messages not yet received by a consumer.
    pub fn pending(&self) -> usize {
        self.inner.ready.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Ids acknowledged so far, in acknowledgement order.
    pub fn acked(&self) -> Vec<String> {
        self.inner.acked.lock().map(|a| a.clone()).unwrap_or_default()
    }

    fn push(&self, body: Option<String>) -> String {
        let n = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("{n}-0");
        if let Ok(mut q) = self.inner.ready.lock() {
            q.push_back(QueueMessage {
                id: id.clone(),
                body,
            });
        }
        id
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn publish(&self, body: &str) -> Result<String, QueueError> {
        Ok(self.push(Some(body.to_string())))
    }
}

#[async_trait]
impl JobSource for InMemoryJobQueue {
    async fn receive(&mut self, max: usize, block: Duration) -> Result<Vec<QueueMessage>, QueueError> {
        let batch = drain_front(&self.inner.ready, max);
        if batch.is_empty() {
            tokio::time::sleep(block).await;
        }
        Ok(batch)
    }

    async fn ack(&mut self, message_ids: &[String]) -> Result<(), QueueError> {
        let mut acked = self
            .inner
            .acked
            .lock()
            .map_err(|_| QueueError::Command("ack list lock poisoned".to_string()))?;
        acked.extend(message_ids.iter().cloned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn receives_in_publish_order_and_respects_max() {
        let queue = InMemoryJobQueue::new();
        let mut consumer = queue.clone();

        for i in 0..3 {
            queue.publish(&format!("body-{i}")).await.unwrap();
        }

        let first = consumer.receive(2, Duration::ZERO).await.unwrap();
        let bodies: Vec<_> = first.iter().filter_map(|m| m.body.clone()).collect();
        assert_eq!(bodies, vec!["body-0", "body-1"]);
        assert_eq!(queue.pending(), 1);

        let ids: Vec<_> = first.iter().map(|m| m.id.clone()).collect();
        consumer.ack(&ids).await.unwrap();
        assert_eq!(queue.acked(), ids);
    }

    #[tokio::test]
    async fn empty_queue_returns_empty_batch_after_block() {
        let mut consumer = InMemoryJobQueue::new();
        let batch = consumer.receive(5, Duration::from_millis(5)).await.unwrap();
        assert!(batch.is_empty());
    }
}
