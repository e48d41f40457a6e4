//! `queryjob-core`: job pipeline building blocks.
//!
//! This crate contains the **pure** parts of the pipeline: envelope decoding,
//! the tagged row value model and result encoding. Connections, stores and
//! transports live in `queryjob-infra`.

pub mod error;
pub mod id;
pub mod job;
pub mod outcome;
pub mod value;

pub use error::{DecodeError, EncodeError, QueryError};
pub use id::JobId;
pub use job::{Job, decode};
pub use outcome::{
    CONNECTION_ERROR_PAYLOAD, ENCODING_ERROR_PREFIX, QueryOutcome, StoredResult, encode,
    encode_rows,
};
pub use value::{Row, SqlValue};
