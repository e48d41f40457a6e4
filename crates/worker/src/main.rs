use anyhow::Context;

use queryjob_infra::queue::RedisStreamsConsumer;
use queryjob_infra::result_store::RedisResultStore;
use queryjob_infra::{JobProcessor, JobWorker, JobWorkerConfig, RedshiftExecutor, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    queryjob_observability::init();

    let config = WorkerConfig::from_env()?;
    tracing::info!(config = ?config, "starting query job worker");

    // One store handle per process; warehouse connections are opened per job.
    let store = RedisResultStore::connect(&config.redis_url, config.result_table.clone())
        .await
        .context("failed to connect to the result store")?;
    let executor = RedshiftExecutor::new(&config.warehouse);
    let processor = JobProcessor::new(executor, store);

    let source = RedisStreamsConsumer::connect(
        &config.redis_url,
        config.stream_key.clone(),
        config.consumer_group.clone(),
        config.consumer_name.clone(),
    )
    .await
    .context("failed to join the job consumer group")?;

    let worker_config = JobWorkerConfig::default()
        .with_name(source.consumer_name().to_string())
        .with_concurrency(config.concurrency)
        .with_job_timeout(config.job_deadline);

    let stats = JobWorker::new(source, processor, worker_config)
        .run(shutdown_signal())
        .await;

    tracing::info!(
        received = stats.received,
        recorded = stats.recorded,
        dropped = stats.dropped,
        persist_failed = stats.persist_failed,
        "worker shut down"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
