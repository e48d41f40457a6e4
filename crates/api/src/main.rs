use std::sync::Arc;

use anyhow::Context;

use queryjob_infra::IngressConfig;
use queryjob_infra::queue::RedisStreamsJobQueue;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    queryjob_observability::init();

    let config = IngressConfig::from_env()?;
    let queue = RedisStreamsJobQueue::connect(&config.redis_url, config.stream_key.clone())
        .await
        .context("failed to connect to the job queue")?;

    let app = queryjob_api::app::build_app(Arc::new(queue));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        stream_key = %config.stream_key,
        "listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
