//! Job processor: decode → connect → execute → encode → persist.
//!
//! ## Failure isolation
//!
//! | Failing step | Stored payload |
//! |--------------|----------------|
//! | decode | nothing (no id to record against) |
//! | connect | [`CONNECTION_ERROR_PAYLOAD`] |
//! | execute | the warehouse's error description, verbatim |
//! | encode | [`queryjob_core::ENCODING_ERROR_PREFIX`] + reason |
//! | persist | nothing more can be done; logged |
//!
//! Every job with a decodable id gets exactly one persist attempt. Nothing is
//! retried here; redelivery is the transport's business.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{Span, debug, error, info, instrument, warn};

use queryjob_core::{
    CONNECTION_ERROR_PAYLOAD, DecodeError, Job, JobId, QueryError, QueryOutcome, decode, encode,
    encode_rows,
};

use crate::result_store::ResultStore;
use crate::warehouse::QueryExecutor;

/// Per-job execution context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobContext {
    deadline: Option<Instant>,
}

impl JobContext {
    /// No deadline: connect and execute may block indefinitely.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    /// Deadline `timeout` from now, or unbounded when `None`.
    pub fn from_timeout(timeout: Option<Duration>) -> Self {
        Self {
            deadline: timeout.map(|t| Instant::now() + t),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

/// Which payload a recorded job received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Rows,
    ConnectionFailed,
    QueryFailed,
    EncodingFailed,
}

/// Terminal state of one processor run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The envelope could not be decoded; nothing was stored.
    Dropped(DecodeError),
    /// A result record was written.
    Recorded { id: JobId, kind: OutcomeKind },
    /// The final write failed; the job is observable only by its absence.
    PersistFailed {
        id: JobId,
        kind: OutcomeKind,
        error: String,
    },
}

/// Runs the pipeline for one envelope at a time.
///
/// The result store is a long-lived handle injected here; warehouse
/// connections are opened per job by the executor.
pub struct JobProcessor<E, S> {
    executor: E,
    store: S,
}

impl<E, S> JobProcessor<E, S>
where
    E: QueryExecutor,
    S: ResultStore,
{
    pub fn new(executor: E, store: S) -> Self {
        Self { executor, store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Process one raw envelope. Never fails; see [`Disposition`].
    #[instrument(skip(self, envelope, ctx), fields(job_id))]
    pub async fn process(&self, envelope: &str, ctx: &JobContext) -> Disposition {
        let job = match decode(envelope) {
            Ok(job) => job,
            Err(err) => {
                warn!(error = %err, "dropping undecodable job envelope");
                return Disposition::Dropped(err);
            }
        };

        Span::current().record("job_id", job.id.as_str());
        debug!(stage = "decoded", "job decoded");

        let (kind, payload) = self.run(&job, ctx).await;
        self.persist(job.id, kind, payload).await
    }

    async fn run(&self, job: &Job, ctx: &JobContext) -> (OutcomeKind, String) {
        match self.executor.execute(&job.query, ctx.deadline()).await {
            Err(QueryError::Connect(reason)) => {
                error!(stage = "connect", error = %reason, "error connecting to warehouse");
                (OutcomeKind::ConnectionFailed, CONNECTION_ERROR_PAYLOAD.to_string())
            }
            Err(QueryError::Execute(description)) => {
                warn!(stage = "execute", error = %description, "error executing query");
                (
                    OutcomeKind::QueryFailed,
                    encode(&QueryOutcome::Failed(description)),
                )
            }
            Ok(rows) => {
                debug!(stage = "executed", row_count = rows.len(), "query executed");
                match encode_rows(&rows) {
                    Ok(json) => (OutcomeKind::Rows, json),
                    Err(err) => {
                        warn!(stage = "encode", error = %err, "error serializing query result");
                        (OutcomeKind::EncodingFailed, err.payload())
                    }
                }
            }
        }
    }

    async fn persist(&self, id: JobId, kind: OutcomeKind, payload: String) -> Disposition {
        match self.store.persist(&id, &payload).await {
            Ok(()) => {
                info!(stage = "persisted", kind = ?kind, "job result recorded");
                Disposition::Recorded { id, kind }
            }
            Err(err) => {
                error!(stage = "persist", kind = ?kind, error = %err, "error saving job result");
                Disposition::PersistFailed {
                    id,
                    kind,
                    error: err.to_string(),
                }
            }
        }
    }
}
