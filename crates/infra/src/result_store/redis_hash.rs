//! Redis-backed result store.
//!
//! Each record is a hash at `<table>:<id>` with fields `ID` and `Result`.
//! A put is an atomic `DEL` + `HSET` so a record never carries fields from an
//! earlier write.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tracing::instrument;

use queryjob_core::{JobId, StoredResult};

use super::{PersistError, ResultStore};

pub const ID_FIELD: &str = "ID";
pub const RESULT_FIELD: &str = "Result";

/// Result store over one long-lived multiplexed Redis connection.
#[derive(Clone)]
pub struct RedisResultStore {
    conn: MultiplexedConnection,
    table: String,
}

impl RedisResultStore {
    /// Open the connection used for the lifetime of the process.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    /// * `table` - key namespace for result records
    pub async fn connect(
        redis_url: impl AsRef<str>,
        table: impl Into<String>,
    ) -> Result<Self, PersistError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| PersistError::Unavailable(e.to_string()))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| PersistError::Unavailable(e.to_string()))?;

        Ok(Self::from_connection(conn, table))
    }

    pub fn from_connection(conn: MultiplexedConnection, table: impl Into<String>) -> Self {
        Self {
            conn,
            table: table.into(),
        }
    }

    pub fn record_key(&self, id: &JobId) -> String {
        record_key(&self.table, id)
    }
}

pub fn record_key(table: &str, id: &JobId) -> String {
    format!("{table}:{id}")
}

#[async_trait]
impl ResultStore for RedisResultStore {
    #[instrument(skip(self, record), fields(job_id = %record.id, table = %self.table), err)]
    async fn put(&self, record: &StoredResult) -> Result<(), PersistError> {
        let key = self.record_key(&record.id);
        let mut conn = self.conn.clone();

        redis::pipe()
            .atomic()
            .del(&key)
            .ignore()
            .hset_multiple(
                &key,
                &[
                    (ID_FIELD, record.id.as_str()),
                    (RESULT_FIELD, record.payload.as_str()),
                ],
            )
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(map_redis_error)
    }
}

fn map_redis_error(err: redis::RedisError) -> PersistError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
        PersistError::Unavailable(err.to_string())
    } else {
        PersistError::Rejected(err.to_string())
    }
}
