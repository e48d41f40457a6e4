use serde::{Deserialize, Serialize};

/// Body of a `202 Accepted` reply to `POST /request`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub message_id: String,
}
