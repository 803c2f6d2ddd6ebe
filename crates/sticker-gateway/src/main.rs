//! Gateway binary: serves the webhook and runs the delivery stage.

use std::net::SocketAddr;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::watch;
use tracing::{error, info, warn};

use sticker_chat::CloudApiClient;
use sticker_gateway::{create_router, AppState, GatewayConfig};
use sticker_media::{FfmpegCodec, MetadataWriter, StickerPackMetadata};
use sticker_queue::{QueueConfig, RedisQueue};
use sticker_storage::StagingConfig;
use sticker_worker::{
    init_tracing, DeliveryWorker, ExecutorConfig, IntakeValidator, PipelineContext,
    PipelineError, PipelineResult, QueueNames, StageExecutor, WorkerConfig,
};

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
    init_tracing("sticker=info,tower_http=info");

    info!("Starting sticker-gateway");

    let config = GatewayConfig::from_env();
    info!("Gateway config: host={}, port={}", config.host, config.port);

    let (ctx, executor) = match build().await {
        Ok(parts) => parts,
        Err(e) => {
            error!("Failed to start gateway: {}", e);
            std::process::exit(1);
        }
    };
    let executor = Arc::new(executor);

    let metrics_handle = if config.metrics_enabled {
        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                info!("Prometheus metrics enabled at /metrics");
                Some(handle)
            }
            Err(e) => {
                warn!("Failed to install Prometheus recorder: {}", e);
                None
            }
        }
    } else {
        None
    };

    let delivery = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move {
            if let Err(e) = executor.run().await {
                error!("Delivery stage error: {}", e);
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
    info!("Listening on {}", addr);

    let shutdown_timeout = config.shutdown_timeout;
    let state = AppState::new(config, IntakeValidator::new(ctx));
    let jobs = state.jobs.clone();
    let app = create_router(state, metrics_handle);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(executor.shutdown_handle()))
        .await
    {
        error!("Server error: {}", e);
    }

    let aborted = jobs.drain(shutdown_timeout).await;
    if aborted > 0 {
        warn!("{} intake job(s) aborted at shutdown", aborted);
    }

    if let Err(e) = delivery.await {
        error!("Delivery stage panicked: {}", e);
    }

    info!("Gateway shutdown complete");
}

/// Wire the pipeline context and the delivery stage executor.
async fn build() -> PipelineResult<(PipelineContext, StageExecutor<DeliveryWorker>)> {
    let worker_config = WorkerConfig::from_env();
    worker_config.validate()?;

    let queue_config = QueueConfig::from_env();
    queue_config.validate().map_err(PipelineError::config)?;
    let queues = QueueNames::from_config(&queue_config);
    let executor_config = ExecutorConfig {
        block: queue_config.block,
        claim_interval: worker_config.claim_interval,
        claim_min_idle: queue_config.claim_min_idle,
    };
    let queue = Arc::new(RedisQueue::connect(queue_config).await?);

    let staging = StagingConfig::from_env()?.build().await?;
    let chat = Arc::new(CloudApiClient::from_env()?);
    // Intake probes undeclared video durations through the codec; it never encodes here.
    let codec = Arc::new(FfmpegCodec::new(worker_config.conversion.codec_timeout_secs));
    let metadata = MetadataWriter::new(&StickerPackMetadata::from_env())?;

    let ctx = PipelineContext::new(
        &worker_config,
        queues,
        queue.clone(),
        staging,
        chat,
        codec,
        metadata,
    );
    ctx.declare_queues().await?;

    let executor = StageExecutor::new(
        Arc::new(DeliveryWorker::new(ctx.clone())),
        queue,
        executor_config,
    );
    Ok((ctx, executor))
}

async fn shutdown_signal(delivery: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Received shutdown signal");
    let _ = delivery.send(true);
}
