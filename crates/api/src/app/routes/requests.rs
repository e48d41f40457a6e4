use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{info, warn};

use queryjob_infra::JobQueue;

use crate::app::dto::SubmitResponse;
use crate::app::errors::queue_error_to_response;

/// `POST /request`: enqueue the raw body as a job envelope.
///
/// The body is not validated here. Malformed envelopes are dropped by the
/// worker's decoder, exactly as if they had reached the queue some other way.
pub async fn submit(Extension(queue): Extension<Arc<dyn JobQueue>>, body: String) -> Response {
    match queue.publish(&body).await {
        Ok(message_id) => {
            info!(message_id = %message_id, bytes = body.len(), "job envelope enqueued");
            (StatusCode::ACCEPTED, Json(SubmitResponse { message_id })).into_response()
        }
        Err(err) => {
            warn!(error = %err, "failed to enqueue job envelope");
            queue_error_to_response(err)
        }
    }
}
