//! Job queue: where envelopes wait between ingress and the worker.
//!
//! Delivery is at-least-once. A message is acknowledged only after the
//! processor finishes with it, so a crash mid-job means redelivery; the result
//! store's overwrite-by-key makes that safe.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis_streams;

pub use in_memory::InMemoryJobQueue;
#[cfg(feature = "redis")]
pub use redis_streams::{RedisStreamsConsumer, RedisStreamsJobQueue};

#[derive(Debug, Clone, thiserror::Error)]
pub enum QueueError {
    #[error("queue connection error: {0}")]
    Connection(String),

    #[error("queue command error: {0}")]
    Command(String),

    #[error("consumer group error: {0}")]
    ConsumerGroup(String),
}

/// A message as delivered by the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Transport-assigned id, used for acknowledgement.
    pub id: String,
    /// Raw envelope. `None` when the entry carried no body.
    pub body: Option<String>,
}

/// Producer side.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a raw envelope and return the transport's message id.
    async fn publish(&self, body: &str) -> Result<String, QueueError>;
}

/// Consumer side.
#[async_trait]
pub trait JobSource: Send {
    /// Receive up to `max` messages, waiting at most `block` when none are ready.
    async fn receive(&mut self, max: usize, block: Duration) -> Result<Vec<QueueMessage>, QueueError>;

    /// Mark messages as processed.
    async fn ack(&mut self, message_ids: &[String]) -> Result<(), QueueError>;
}

#[async_trait]
impl<Q> JobQueue for std::sync::Arc<Q>
where
    Q: JobQueue + ?Sized,
{
    async fn publish(&self, body: &str) -> Result<String, QueueError> {
        (**self).publish(body).await
    }
}

pub(crate) fn drain_front<T>(queue: &Mutex<VecDeque<T>>, max: usize) -> Vec<T> {
    match queue.lock() {
        Ok(mut q) => {
            let n = max.min(q.len());
            q.drain(..n).collect()
        }
        Err(_) => Vec::new(),
    }
}
