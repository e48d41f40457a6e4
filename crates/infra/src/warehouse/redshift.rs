//! Redshift executor over the Postgres wire protocol.
//!
//! ## Value mapping
//!
//! | Column type | `SqlValue` |
//! |-------------|------------|
//! | `bool` | `Bool` |
//! | `int2`, `int4`, `int8` | `Integer` |
//! | `float4`, `float8` | `Float` |
//! | `numeric` | `Decimal` (exact) |
//! | `text`, `varchar`, `bpchar`, `name`, `unknown` | `String` |
//! | any value that is NULL | `Null` |
//! | anything else | `Unsupported` (rejected by the encoder) |
//!
//! A value of a mapped type that fails to decode (e.g. `NaN` numeric) fails
//! the whole query with [`QueryError::Execute`].
//!
//! The connection is closed on every path. The close handshake gets its own
//! short limit so a dead socket cannot hold the job past its deadline.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow, PgTypeInfo};
use sqlx::{Column, Connection, Row as _, TypeInfo, ValueRef};
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, instrument, warn};

use queryjob_core::{QueryError, Row, SqlValue};

use super::QueryExecutor;
use crate::config::WarehouseConfig;

const APPLICATION_NAME: &str = "queryjob-worker";
const QUERY_DEADLINE_EXCEEDED: &str = "query deadline exceeded";
/// Upper bound on the close handshake; the job deadline may already be spent.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Per-call connection factory + query runner for Redshift.
#[derive(Debug, Clone)]
pub struct RedshiftExecutor {
    options: PgConnectOptions,
}

impl RedshiftExecutor {
    pub fn new(config: &WarehouseConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(config.password())
            .application_name(APPLICATION_NAME);

        Self { options }
    }

    pub fn connect_options(&self) -> &PgConnectOptions {
        &self.options
    }

    async fn connect(&self, deadline: Option<Instant>) -> Result<PgConnection, QueryError> {
        bounded(deadline, PgConnection::connect_with(&self.options))
            .await
            .ok_or_else(|| QueryError::connect("deadline exceeded while connecting"))?
            .map_err(|e| QueryError::connect(e.to_string()))
    }
}

#[async_trait]
impl QueryExecutor for RedshiftExecutor {
    #[instrument(
        skip(self, query),
        fields(host = %self.options.get_host(), port = self.options.get_port())
    )]
    async fn execute(
        &self,
        query: &str,
        deadline: Option<Instant>,
    ) -> Result<Vec<Row>, QueryError> {
        let mut conn = self.connect(deadline).await?;
        debug!("warehouse connection established");

        let result = execute_bounded(deadline, run_query(&mut conn, query)).await;
        close_bounded(conn.close(), CLOSE_TIMEOUT).await;

        result
    }
}

/// Await `fut`, giving up at `deadline` if one is set. `None` means timed out.
async fn bounded<F>(deadline: Option<Instant>, fut: F) -> Option<F::Output>
where
    F: Future,
{
    match deadline {
        Some(at) => timeout_at(at, fut).await.ok(),
        None => Some(fut.await),
    }
}

/// Run the query future until `deadline`; running out is an execute error.
async fn execute_bounded<F>(deadline: Option<Instant>, fut: F) -> Result<Vec<Row>, QueryError>
where
    F: Future<Output = Result<Vec<Row>, QueryError>>,
{
    bounded(deadline, fut)
        .await
        .unwrap_or_else(|| Err(QueryError::execute(QUERY_DEADLINE_EXCEEDED)))
}

/// Await a close for at most `limit`. Returns whether it finished cleanly;
/// otherwise the connection is simply dropped.
async fn close_bounded<F>(close: F, limit: Duration) -> bool
where
    F: Future<Output = Result<(), sqlx::Error>>,
{
    match timeout(limit, close).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(error = %e, "failed to close warehouse connection cleanly");
            false
        }
        Err(_) => {
            warn!(limit_ms = limit.as_millis() as u64, "timed out closing warehouse connection");
            false
        }
    }
}

async fn run_query(conn: &mut PgConnection, query: &str) -> Result<Vec<Row>, QueryError> {
    let rows = sqlx::query(query)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| QueryError::execute(describe(&e)))?;

    debug!(row_count = rows.len(), "query returned");
    rows.iter().map(decode_row).collect()
}

/// Database errors carry the server's message; everything else its Display.
fn describe(err: &sqlx::Error) -> String {
    match err.as_database_error() {
        Some(db) => db.message().to_string(),
        None => err.to_string(),
    }
}

fn decode_row(row: &PgRow) -> Result<Row, QueryError> {
    let mut out = Row::with_capacity(row.len());
    for column in row.columns() {
        let value = decode_value(row, column.ordinal(), column.type_info()).map_err(|e| {
            QueryError::execute(format!("failed to decode column {}: {e}", column.name()))
        })?;
        out.insert(column.name(), value);
    }
    Ok(out)
}

fn decode_value(row: &PgRow, idx: usize, type_info: &PgTypeInfo) -> Result<SqlValue, sqlx::Error> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(SqlValue::Null);
    }

    let value = match type_info.name() {
        "BOOL" => SqlValue::Bool(row.try_get(idx)?),
        "INT2" => SqlValue::Integer(row.try_get::<i16, _>(idx)?.into()),
        "INT4" => SqlValue::Integer(row.try_get::<i32, _>(idx)?.into()),
        "INT8" => SqlValue::Integer(row.try_get(idx)?),
        "FLOAT4" => SqlValue::Float(row.try_get::<f32, _>(idx)?.into()),
        "FLOAT8" => SqlValue::Float(row.try_get(idx)?),
        "NUMERIC" => SqlValue::Decimal(row.try_get(idx)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "UNKNOWN" => SqlValue::String(row.try_get(idx)?),
        other => SqlValue::unsupported(other.to_ascii_lowercase()),
    };

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn unreachable_config() -> WarehouseConfig {
        // Port 1 on loopback: nothing listens there, so connecting fails fast.
        WarehouseConfig::new("127.0.0.1", "dev", "admin", "secret").with_port(1)
    }

    #[test]
    fn connect_options_follow_config() {
        let config = WarehouseConfig::new("wg.example.com", "analytics", "reporter", "pw");
        let executor = RedshiftExecutor::new(&config);
        let options = executor.connect_options();

        assert_eq!(options.get_host(), "wg.example.com");
        assert_eq!(options.get_port(), 5439);
        assert_eq!(options.get_database(), Some("analytics"));
        assert_eq!(options.get_username(), "reporter");
    }

    #[tokio::test]
    async fn unreachable_warehouse_is_a_connect_error() {
        let executor = RedshiftExecutor::new(&unreachable_config());

        let err = executor.execute("select 1", None).await.unwrap_err();
        assert!(matches!(err, QueryError::Connect(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn elapsed_deadline_is_a_connect_error() {
        let executor = RedshiftExecutor::new(&unreachable_config());
        let deadline = Instant::now() - Duration::from_millis(1);

        let err = executor.execute("select 1", Some(deadline)).await.unwrap_err();
        assert!(matches!(err, QueryError::Connect(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn query_outliving_the_deadline_is_an_execute_error() {
        let deadline = Instant::now() + Duration::from_millis(10);
        let started = Instant::now();

        let err = execute_bounded(Some(deadline), std::future::pending())
            .await
            .unwrap_err();

        assert_eq!(err, QueryError::Execute(QUERY_DEADLINE_EXCEEDED.to_string()));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn query_finishing_in_time_keeps_its_result() {
        let deadline = Instant::now() + Duration::from_secs(5);

        let rows = execute_bounded(Some(deadline), async { Ok(vec![Row::new().with("n", 1_i64)]) })
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);

        let err = execute_bounded(None, async { Err(QueryError::execute("syntax error")) })
            .await
            .unwrap_err();
        assert_eq!(err, QueryError::Execute("syntax error".to_string()));
    }

    #[tokio::test]
    async fn hung_close_is_abandoned_after_its_limit() {
        let started = Instant::now();

        let clean = close_bounded(
            std::future::pending::<Result<(), sqlx::Error>>(),
            Duration::from_millis(10),
        )
        .await;

        assert!(!clean);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(close_bounded(async { Ok(()) }, Duration::from_millis(10)).await);
        assert!(!close_bounded(async { Err(sqlx::Error::PoolClosed) }, Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn bounded_gives_up_after_deadline() {
        let deadline = Instant::now() + Duration::from_millis(10);
        let out = bounded(Some(deadline), tokio::time::sleep(Duration::from_secs(5))).await;
        assert!(out.is_none());

        let out = bounded(None, async { 7 }).await;
        assert_eq!(out, Some(7));
    }
}
