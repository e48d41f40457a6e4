//! Job envelope decoding.
//!
//! A transport message body looks like `{"message": "<id>|<query>"}`. The
//! message string is split on the **first** `|` only, so query text may
//! contain further `|` characters.

use serde_json::Value as JsonValue;

use crate::error::DecodeError;
use crate::id::JobId;

/// One unit of work: run `query`, record the outcome under `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub query: String,
}

impl Job {
    pub fn new(id: impl Into<JobId>, query: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            query: query.into(),
        }
    }
}

/// Decode a raw envelope into a [`Job`].
pub fn decode(raw_envelope: &str) -> Result<Job, DecodeError> {
    let body: JsonValue = serde_json::from_str(raw_envelope)
        .map_err(|e| DecodeError::InvalidJson(e.to_string()))?;

    let message = body
        .get("message")
        .ok_or(DecodeError::MissingMessage)?
        .as_str()
        .ok_or(DecodeError::MessageNotString)?;

    let (id, query) = message
        .split_once('|')
        .ok_or(DecodeError::MissingSeparator)?;

    Ok(Job::new(id, query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn splits_on_first_separator_only() {
        let job = decode(r#"{"message": "7|select a|b"}"#).unwrap();
        assert_eq!(job.id.as_str(), "7");
        assert_eq!(job.query, "select a|b");
    }

    #[test]
    fn ignores_extra_fields() {
        let job = decode(r#"{"message": "42|select 1", "source": "api"}"#).unwrap();
        assert_eq!(job, Job::new("42", "select 1"));
    }

    #[test]
    fn empty_parts_are_still_two_parts() {
        let job = decode(r#"{"message": "|"}"#).unwrap();
        assert_eq!(job.id.as_str(), "");
        assert_eq!(job.query, "");
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(matches!(
            decode("not json"),
            Err(DecodeError::InvalidJson(_))
        ));
        assert!(matches!(decode(""), Err(DecodeError::InvalidJson(_))));
    }

    #[test]
    fn rejects_missing_message() {
        assert_eq!(
            decode(r#"{"msg": "1|select 1"}"#),
            Err(DecodeError::MissingMessage)
        );
        assert_eq!(decode(r#"["1|select 1"]"#), Err(DecodeError::MissingMessage));
    }

    #[test]
    fn rejects_non_string_message() {
        assert_eq!(
            decode(r#"{"message": 17}"#),
            Err(DecodeError::MessageNotString)
        );
    }

    #[test]
    fn rejects_message_without_separator() {
        assert_eq!(
            decode(r#"{"message": "select 1"}"#),
            Err(DecodeError::MissingSeparator)
        );
    }

    proptest! {
        #[test]
        fn id_and_query_survive_the_split(
            id in "[^|]{0,24}",
            query in ".{0,64}",
        ) {
            let message = format!("{id}|{query}");
            let raw = serde_json::json!({ "message": message }).to_string();

            let job = decode(&raw).unwrap();
            prop_assert_eq!(job.id.as_str(), id.as_str());
            prop_assert_eq!(job.query, query);
        }

        #[test]
        fn messages_without_separator_never_decode(message in "[^|]{0,64}") {
            let raw = serde_json::json!({ "message": message }).to_string();
            prop_assert_eq!(decode(&raw), Err(DecodeError::MissingSeparator));
        }
    }
}
