//! HTTP application wiring (Axum router).
//!
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: response bodies
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{get, post},
};

use queryjob_infra::JobQueue;

pub mod dto;
pub mod errors;
pub mod routes;

/// Build the ingress router (public entrypoint used by `main.rs`).
pub fn build_app(queue: Arc<dyn JobQueue>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .route("/request", post(routes::requests::submit))
        .layer(Extension(queue))
}
