//! Infrastructure layer: warehouse connections, result stores, the job queue,
//! the job processor and the worker loop that drives it.

pub mod config;
pub mod processor;
pub mod queue;
pub mod result_store;
pub mod warehouse;
pub mod workers;

pub use config::{ConfigError, IngressConfig, WarehouseConfig, WorkerConfig};
pub use processor::{Disposition, JobContext, JobProcessor, OutcomeKind};
pub use queue::{InMemoryJobQueue, JobQueue, JobSource, QueueError, QueueMessage};
pub use result_store::{InMemoryResultStore, PersistError, ResultStore};
pub use warehouse::{QueryExecutor, RedshiftExecutor};
pub use workers::job_worker::{JobWorker, JobWorkerConfig, WorkerStats};
