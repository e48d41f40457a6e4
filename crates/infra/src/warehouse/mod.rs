//! Analytic store access.
//!
//! Unlike the result store, warehouse connections are never shared: every
//! call to [`QueryExecutor::execute`] opens its own connection and closes it
//! before returning.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;

use queryjob_core::{QueryError, Row};

pub mod redshift;

pub use redshift::RedshiftExecutor;

/// Runs one query on a fresh connection.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Connect, run `query` once, fetch every row, disconnect.
    ///
    /// `deadline`, when set, bounds both connecting and executing.
    async fn execute(&self, query: &str, deadline: Option<Instant>)
    -> Result<Vec<Row>, QueryError>;
}

#[async_trait]
impl<E> QueryExecutor for Arc<E>
where
    E: QueryExecutor + ?Sized,
{
    async fn execute(
        &self,
        query: &str,
        deadline: Option<Instant>,
    ) -> Result<Vec<Row>, QueryError> {
        (**self).execute(query, deadline).await
    }
}
