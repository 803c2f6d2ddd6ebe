//! Telemetry binary: consumes the telemetry queue and serves `/metrics`.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info};

use sticker_queue::{QueueConfig, RedisQueue};
use sticker_telemetry::{
    create_router, init_metrics, CallingCodeLookup, TelemetryAggregator, TelemetryConfig,
};
use sticker_worker::{init_tracing, ExecutorConfig, PipelineError, PipelineResult, StageExecutor};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }

    dotenvy::dotenv().ok();
    init_tracing("sticker=info");

    info!("Starting sticker-telemetry");

    let config = TelemetryConfig::from_env();

    let metrics_handle = match init_metrics() {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to install Prometheus recorder: {}", e);
            std::process::exit(1);
        }
    };

    let executor = match build().await {
        Ok(executor) => Arc::new(executor),
        Err(e) => {
            error!("Failed to start telemetry stage: {}", e);
            std::process::exit(1);
        }
    };

    let consumer = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move {
            if let Err(e) = executor.run().await {
                error!("Telemetry stage error: {}", e);
            }
        })
    };

    let addr: SocketAddr = match config.bind_address().parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid bind address {}: {}", config.bind_address(), e);
            std::process::exit(1);
        }
    };
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    info!("Serving metrics on {}/metrics", addr);

    let shutdown = executor.shutdown_handle();
    let app = create_router(metrics_handle);
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Received shutdown signal");
            let _ = shutdown.send(true);
        })
        .await
    {
        error!("Server error: {}", e);
    }

    if let Err(e) = consumer.await {
        error!("Telemetry stage panicked: {}", e);
    }

    info!("Telemetry shutdown complete");
}

async fn build() -> PipelineResult<StageExecutor<TelemetryAggregator>> {
    let queue_config = QueueConfig::from_env();
    queue_config.validate().map_err(PipelineError::config)?;

    let executor_config = ExecutorConfig {
        block: queue_config.block,
        claim_min_idle: queue_config.claim_min_idle,
        ..ExecutorConfig::default()
    };
    let queue_name = queue_config.telemetry_queue.clone();
    let queue = Arc::new(RedisQueue::connect(queue_config).await?);

    let aggregator = TelemetryAggregator::new(queue_name, Arc::new(CallingCodeLookup::new()));
    Ok(StageExecutor::new(Arc::new(aggregator), queue, executor_config))
}
