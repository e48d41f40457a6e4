//! Pipeline error model.

use thiserror::Error;

/// A raw envelope could not be turned into a [`crate::Job`].
///
/// There is no id to record an outcome against, so jobs failing here are
/// dropped by the processor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The body is not valid JSON.
    #[error("invalid JSON body: {0}")]
    InvalidJson(String),

    /// The body has no `message` field (or is not a JSON object).
    #[error("missing `message` field")]
    MissingMessage,

    /// `message` is present but is not a string.
    #[error("`message` field is not a string")]
    MessageNotString,

    /// `message` has no `|` between id and query.
    #[error("`message` has no `|` separator")]
    MissingSeparator,
}

/// Failure while running a query against the warehouse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The connection could not be established (unreachable, auth, deadline).
    #[error("connection failed: {0}")]
    Connect(String),

    /// The connection was fine but the query (or row decoding) failed.
    #[error("{0}")]
    Execute(String),
}

impl QueryError {
    pub fn connect(msg: impl Into<String>) -> Self {
        Self::Connect(msg.into())
    }

    pub fn execute(msg: impl Into<String>) -> Self {
        Self::Execute(msg.into())
    }
}

/// A result set holds a value the JSON encoder cannot represent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct EncodeError(pub String);

impl EncodeError {
    /// The text recorded for a job whose result set could not be encoded.
    pub fn payload(&self) -> String {
        format!("{}{}", crate::outcome::ENCODING_ERROR_PREFIX, self.0)
    }
}
