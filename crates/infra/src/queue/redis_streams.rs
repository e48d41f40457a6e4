//! Redis Streams-backed job queue (durable, at-least-once delivery).
//!
//! - **Stream Key**: `queryjob:jobs` by default; each entry carries a `body`
//!   field (the raw envelope) and a `submitted_at` timestamp
//! - **Consumer Group**: one per worker fleet (`queryjob.worker`), created on
//!   first use with `MKSTREAM`
//! - **Consumers**: one per worker process, named `worker-<uuid>` unless given
//! - **Redelivery**: on startup a consumer walks its own pending (delivered,
//!   unacknowledged) entries once, then reads new ones. An entry it fails to
//!   acknowledge again stays pending until the next restart.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamReadOptions, StreamReadReply};
use tracing::{debug, info, instrument};

use super::{JobQueue, JobSource, QueueError, QueueMessage};

pub const BODY_FIELD: &str = "body";
pub const SUBMITTED_AT_FIELD: &str = "submitted_at";

/// Start id that re-reads this consumer's pending entries.
const PENDING_START: &str = "0";
/// Start id for entries never delivered to the group.
const NEW_START: &str = ">";

async fn open(redis_url: &str) -> Result<MultiplexedConnection, QueueError> {
    let client =
        redis::Client::open(redis_url).map_err(|e| QueueError::Connection(e.to_string()))?;
    client
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| QueueError::Connection(e.to_string()))
}

/// Publishing half, used by the ingress.
#[derive(Clone)]
pub struct RedisStreamsJobQueue {
    conn: MultiplexedConnection,
    stream_key: String,
}

impl RedisStreamsJobQueue {
    pub async fn connect(redis_url: &str, stream_key: impl Into<String>) -> Result<Self, QueueError> {
        Ok(Self {
            conn: open(redis_url).await?,
            stream_key: stream_key.into(),
        })
    }
}

#[async_trait]
impl JobQueue for RedisStreamsJobQueue {
    #[instrument(skip(self, body), fields(stream_key = %self.stream_key), err)]
    async fn publish(&self, body: &str) -> Result<String, QueueError> {
        let submitted_at = chrono::Utc::now().to_rfc3339();
        let mut conn = self.conn.clone();

        conn.xadd(
            &self.stream_key,
            "*",
            &[(BODY_FIELD, body), (SUBMITTED_AT_FIELD, submitted_at.as_str())],
        )
        .await
        .map_err(|e| QueueError::Command(format!("XADD failed: {e}")))
    }
}

/// One consumer's reads and acknowledgements within a stream consumer group.
#[async_trait]
pub trait ConsumerGroupReader: Send {
    /// `XREADGROUP` from `start`: `">"` for new entries, any other id for this
    /// consumer's pending entries with a greater id.
    async fn read_group(
        &mut self,
        start: &str,
        max: usize,
        block: Option<Duration>,
    ) -> Result<Vec<QueueMessage>, QueueError>;

    async fn ack(&mut self, message_ids: &[String]) -> Result<(), QueueError>;
}

/// Progress through this consumer's pending entries after a (re)start.
///
/// The pending list is walked once, each read starting after the last id
/// handed out. An entry left unacknowledged is not returned again by this
/// process; it stays pending until the next restart.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Backlog {
    Pending { after: String },
    Drained,
}

impl Backlog {
    fn new() -> Self {
        Backlog::Pending {
            after: PENDING_START.to_string(),
        }
    }

    fn next_start(&self) -> Option<String> {
        match self {
            Backlog::Pending { after } => Some(after.clone()),
            Backlog::Drained => None,
        }
    }

    fn advance(&mut self, batch: &[QueueMessage]) {
        *self = match batch.last() {
            Some(last) => Backlog::Pending {
                after: last.id.clone(),
            },
            None => Backlog::Drained,
        };
    }
}

/// Consuming half, used by the worker: pending entries first, then new ones.
pub struct GroupConsumer<G> {
    group: G,
    backlog: Backlog,
}

impl<G: ConsumerGroupReader> GroupConsumer<G> {
    pub fn new(group: G) -> Self {
        Self {
            group,
            backlog: Backlog::new(),
        }
    }
}

pub type RedisStreamsConsumer = GroupConsumer<RedisConsumerGroup>;

impl GroupConsumer<RedisConsumerGroup> {
    /// Connect and make sure the consumer group exists.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    /// * `stream_key` - stream holding job envelopes
    /// * `group` - consumer group shared by all workers
    /// * `consumer` - unique name of this worker; generated when `None`
    pub async fn connect(
        redis_url: &str,
        stream_key: impl Into<String>,
        group: impl Into<String>,
        consumer: Option<String>,
    ) -> Result<Self, QueueError> {
        let group = RedisConsumerGroup::connect(redis_url, stream_key, group, consumer).await?;
        Ok(Self::new(group))
    }

    pub fn consumer_name(&self) -> &str {
        &self.group.consumer
    }
}

#[async_trait]
impl<G: ConsumerGroupReader> JobSource for GroupConsumer<G> {
    async fn receive(&mut self, max: usize, block: Duration) -> Result<Vec<QueueMessage>, QueueError> {
        if let Some(after) = self.backlog.next_start() {
            let pending = self.group.read_group(&after, max, None).await?;
            self.backlog.advance(&pending);
            if !pending.is_empty() {
                debug!(count = pending.len(), "redelivering pending entries");
                return Ok(pending);
            }
        }

        self.group.read_group(NEW_START, max, Some(block)).await
    }

    async fn ack(&mut self, message_ids: &[String]) -> Result<(), QueueError> {
        if message_ids.is_empty() {
            return Ok(());
        }
        self.group.ack(message_ids).await
    }
}

/// A Redis consumer group member over one multiplexed connection.
pub struct RedisConsumerGroup {
    conn: MultiplexedConnection,
    stream_key: String,
    group: String,
    consumer: String,
}

impl RedisConsumerGroup {
    pub async fn connect(
        redis_url: &str,
        stream_key: impl Into<String>,
        group: impl Into<String>,
        consumer: Option<String>,
    ) -> Result<Self, QueueError> {
        let mut this = Self {
            conn: open(redis_url).await?,
            stream_key: stream_key.into(),
            group: group.into(),
            consumer: consumer.unwrap_or_else(|| format!("worker-{}", uuid::Uuid::now_v7())),
        };
        this.ensure_group().await?;
        info!(
            stream_key = %this.stream_key,
            group = %this.group,
            consumer = %this.consumer,
            "job consumer ready"
        );
        Ok(this)
    }

    /// Create the consumer group (idempotent).
    async fn ensure_group(&mut self) -> Result<(), QueueError> {
        let created: redis::RedisResult<()> = self
            .conn
            .xgroup_create_mkstream(&self.stream_key, &self.group, "0")
            .await;

        match created {
            Ok(()) => Ok(()),
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(QueueError::ConsumerGroup(e.to_string())),
        }
    }
}

#[async_trait]
impl ConsumerGroupReader for RedisConsumerGroup {
    async fn read_group(
        &mut self,
        start: &str,
        max: usize,
        block: Option<Duration>,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let mut options = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(max);
        if let Some(block) = block {
            options = options.block(block.as_millis() as usize);
        }

        // A blocking read that times out replies with nil.
        let reply: Option<StreamReadReply> = self
            .conn
            .xread_options(&[self.stream_key.as_str()], &[start], &options)
            .await
            .map_err(|e| QueueError::Command(format!("XREADGROUP failed: {e}")))?;

        Ok(reply.map(parse_reply).unwrap_or_default())
    }

    async fn ack(&mut self, message_ids: &[String]) -> Result<(), QueueError> {
        let _: u64 = self
            .conn
            .xack(&self.stream_key, &self.group, message_ids)
            .await
            .map_err(|e| QueueError::Command(format!("XACK failed: {e}")))?;

        Ok(())
    }
}

fn parse_reply(reply: StreamReadReply) -> Vec<QueueMessage> {
    reply
        .keys
        .into_iter()
        .flat_map(|key| key.ids)
        .map(|entry| QueueMessage {
            body: entry.get(BODY_FIELD),
            id: entry.id,
        })
        .collect()
}
