//! Conversion stage binary.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info, warn};

use sticker_chat::CloudApiClient;
use sticker_media::{check_ffmpeg, FfmpegCodec, MetadataWriter, StickerPackMetadata};
use sticker_queue::{QueueConfig, RedisQueue};
use sticker_storage::StagingConfig;
use sticker_worker::{
    init_tracing, ConversionEngine, ExecutorConfig, PipelineContext, PipelineError,
    PipelineResult, QueueNames, StageExecutor, WorkerConfig,
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
    init_tracing("sticker=info");

    info!("Starting sticker-worker");

    if let Some(port) = std::env::var("METRICS_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
    {
        match PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
        {
            Ok(()) => info!(port, "Prometheus metrics listener enabled"),
            Err(e) => warn!("Failed to start metrics listener: {}", e),
        }
    }

    let executor = match build().await {
        Ok(executor) => Arc::new(executor),
        Err(e) => {
            error!("Failed to start conversion stage: {}", e);
            std::process::exit(1);
        }
    };

    let shutdown = executor.shutdown_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        let _ = shutdown.send(true);
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

async fn build() -> PipelineResult<StageExecutor<ConversionEngine>> {
    let config = WorkerConfig::from_env();
    config.validate()?;
    info!("Worker config: {:?}", config);

    let ffmpeg = check_ffmpeg()?;
    info!(path = %ffmpeg.display(), "Found FFmpeg");

    let queue_config = QueueConfig::from_env();
    queue_config.validate().map_err(PipelineError::config)?;
    let queues = QueueNames::from_config(&queue_config);
    let executor_config = ExecutorConfig {
        block: queue_config.block,
        claim_interval: config.claim_interval,
        claim_min_idle: queue_config.claim_min_idle,
    };
    let queue = Arc::new(RedisQueue::connect(queue_config).await?);

    let staging = StagingConfig::from_env()?.build().await?;
    let chat = Arc::new(CloudApiClient::from_env()?);
    let codec = Arc::new(FfmpegCodec::new(config.conversion.codec_timeout_secs));
    let metadata = MetadataWriter::new(&StickerPackMetadata::from_env())?;

    let ctx = PipelineContext::new(&config, queues, queue.clone(), staging, chat, codec, metadata);
    ctx.declare_queues().await?;

    Ok(StageExecutor::new(
        Arc::new(ConversionEngine::new(ctx)),
        queue,
        executor_config,
    ))
}
