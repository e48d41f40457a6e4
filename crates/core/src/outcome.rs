//! Query outcomes and the payloads recorded for them.

use serde::{Deserialize, Serialize};

use crate::error::EncodeError;
use crate::id::JobId;
use crate::value::Row;

/// Payload recorded when the warehouse connection cannot be established.
pub const CONNECTION_ERROR_PAYLOAD: &str = "Error connecting to Redshift";

/// Prefix of the payload recorded when a result set cannot be encoded.
pub const ENCODING_ERROR_PREFIX: &str = "Error serializing query result: ";

/// Result of attempting a job's query: rows, or an error description.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Rows(Vec<Row>),
    Failed(String),
}

impl QueryOutcome {
    pub fn failed(description: impl Into<String>) -> Self {
        Self::Failed(description.into())
    }
}

/// The record written to the result store, keyed by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResult {
    #[serde(rename = "ID")]
    pub id: JobId,
    #[serde(rename = "Result")]
    pub payload: String,
}

impl StoredResult {
    pub fn new(id: JobId, payload: impl Into<String>) -> Self {
        Self {
            id,
            payload: payload.into(),
        }
    }
}

/// Serialize rows to a compact JSON array of objects.
pub fn encode_rows(rows: &[Row]) -> Result<String, EncodeError> {
    serde_json::to_string(rows).map_err(|e| EncodeError(e.to_string()))
}

/// Turn an outcome into the payload string to persist.
///
/// Successful outcomes become JSON text. Failed outcomes pass their
/// description through untouched, so error payloads are always plain text.
/// An unencodable result set yields [`ENCODING_ERROR_PREFIX`] + the reason.
pub fn encode(outcome: &QueryOutcome) -> String {
    match outcome {
        QueryOutcome::Rows(rows) => match encode_rows(rows) {
            Ok(json) => json,
            Err(err) => err.payload(),
        },
        QueryOutcome::Failed(description) => description.clone(),
    }
}
