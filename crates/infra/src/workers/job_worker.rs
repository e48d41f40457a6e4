//! Queue-driven job worker.
//!
//! Pulls batches from a [`JobSource`], runs every message through the
//! [`JobProcessor`] concurrently and acknowledges each one once its pipeline
//! reached a terminal [`Disposition`]. A job task that panics is left
//! unacknowledged so the transport redelivers it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::processor::{Disposition, JobContext, JobProcessor};
use crate::queue::{JobSource, QueueMessage};
use crate::result_store::ResultStore;
use crate::warehouse::QueryExecutor;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct JobWorkerConfig {
    /// Name for logging
    pub name: String,
    /// Maximum messages received (and processed) per batch
    pub concurrency: usize,
    /// How long one receive call may wait for new messages
    pub block: Duration,
    /// Per-job deadline for connect + execute
    pub job_timeout: Option<Duration>,
    /// Pause after a failed receive
    pub error_backoff: Duration,
}

impl Default for JobWorkerConfig {
    fn default() -> Self {
        Self {
            name: "job-worker".to_string(),
            concurrency: 10,
            block: Duration::from_secs(5),
            job_timeout: None,
            error_backoff: Duration::from_secs(1),
        }
    }
}

impl JobWorkerConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_block(mut self, block: Duration) -> Self {
        self.block = block;
        self
    }

    pub fn with_job_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.job_timeout = timeout;
        self
    }

    pub fn with_error_backoff(mut self, backoff: Duration) -> Self {
        self.error_backoff = backoff;
        self
    }
}

/// Worker runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct WorkerStats {
    pub received: u64,
    pub recorded: u64,
    pub dropped: u64,
    pub persist_failed: u64,
    /// Transport entries without a body.
    pub empty_messages: u64,
    pub panicked: u64,
    pub receive_errors: u64,
    pub ack_errors: u64,
}

impl WorkerStats {
    fn observe(&mut self, disposition: &Disposition) {
        match disposition {
            Disposition::Recorded { .. } => self.recorded += 1,
            Disposition::Dropped(_) => self.dropped += 1,
            Disposition::PersistFailed { .. } => self.persist_failed += 1,
        }
    }
}

pub struct JobWorker<Q, E, S> {
    source: Q,
    processor: Arc<JobProcessor<E, S>>,
    config: JobWorkerConfig,
}

impl<Q, E, S> JobWorker<Q, E, S>
where
    Q: JobSource,
    E: QueryExecutor + 'static,
    S: ResultStore + 'static,
{
    pub fn new(source: Q, processor: JobProcessor<E, S>, config: JobWorkerConfig) -> Self {
        Self::with_shared_processor(source, Arc::new(processor), config)
    }

    pub fn with_shared_processor(
        source: Q,
        processor: Arc<JobProcessor<E, S>>,
        config: JobWorkerConfig,
    ) -> Self {
        Self {
            source,
            processor,
            config,
        }
    }

    /// Run until `shutdown` resolves. The batch in flight when it resolves is
    /// finished and acknowledged first.
    pub async fn run<F>(mut self, shutdown: F) -> WorkerStats
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut stats = WorkerStats::default();
        info!(
            worker = %self.config.name,
            concurrency = self.config.concurrency,
            "job worker started"
        );

        loop {
            let received = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                received = self.source.receive(self.config.concurrency, self.config.block) => received,
            };

            let messages = match received {
                Ok(messages) => messages,
                Err(err) => {
                    stats.receive_errors += 1;
                    error!(worker = %self.config.name, error = %err, "failed to receive jobs");
                    tokio::select! {
                        biased;
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(self.config.error_backoff) => {}
                    }
                    continue;
                }
            };

            if messages.is_empty() {
                continue;
            }

            let acks = self.process_batch(messages, &mut stats).await;
            if let Err(err) = self.source.ack(&acks).await {
                stats.ack_errors += 1;
                warn!(
                    worker = %self.config.name,
                    count = acks.len(),
                    error = %err,
                    "failed to acknowledge jobs; they will be redelivered"
                );
            }
        }

        info!(worker = %self.config.name, stats = ?stats, "job worker stopped");
        stats
    }

    /// Returns the ids to acknowledge.
    async fn process_batch(
        &self,
        messages: Vec<QueueMessage>,
        stats: &mut WorkerStats,
    ) -> Vec<String> {
        debug!(worker = %self.config.name, count = messages.len(), "processing batch");
        let mut acks = Vec::with_capacity(messages.len());
        let mut tasks = JoinSet::new();

        for message in messages {
            stats.received += 1;
            let Some(body) = message.body else {
                stats.empty_messages += 1;
                warn!(message_id = %message.id, "queue entry has no body; acknowledging");
                acks.push(message.id);
                continue;
            };

            let processor = Arc::clone(&self.processor);
            let ctx = JobContext::from_timeout(self.config.job_timeout);
            let id = message.id;
            tasks.spawn(async move {
                let disposition = processor.process(&body, &ctx).await;
                (id, disposition)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, disposition)) => {
                    stats.observe(&disposition);
                    acks.push(id);
                }
                Err(err) => {
                    stats.panicked += 1;
                    error!(error = %err, "job task failed; leaving entry unacknowledged");
                }
            }
        }

        acks
    }
}
