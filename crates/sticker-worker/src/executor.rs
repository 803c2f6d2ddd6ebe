//! Stage executor: the consume loop shared by every queue-driven stage.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::counter;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use sticker_queue::{Delivery, RejectOutcome, TaskQueue, PREFETCH};

use crate::error::PipelineResult;

/// A stage that processes deliveries from one queue.
///
/// `handle` returns `Ok` for every business outcome, including failures that
/// dropped the task. Only a malformed payload should surface as an error.
#[async_trait]
pub trait StageHandler: Send + Sync {
    fn stage(&self) -> &'static str;

    fn queue(&self) -> &str;

    async fn handle(&self, delivery: &Delivery) -> PipelineResult<()>;
}

/// Executor timing.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    /// Upper bound of a blocking read
    pub block: Duration,
    /// How often stale pending deliveries are reclaimed
    pub claim_interval: Duration,
    /// Idle time after which a pending delivery may be reclaimed
    pub claim_min_idle: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            block: Duration::from_secs(1),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(300),
        }
    }
}

/// Consumes one queue with a prefetch of one: a delivery is acked or
/// rejected before the next is read.
pub struct StageExecutor<H: StageHandler> {
    handler: Arc<H>,
    queue: Arc<dyn TaskQueue>,
    config: ExecutorConfig,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl<H: StageHandler> StageExecutor<H> {
    pub fn new(handler: Arc<H>, queue: Arc<dyn TaskQueue>, config: ExecutorConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        let consumer_name = format!("{}-{}", handler.stage(), Uuid::new_v4());
        Self {
            handler,
            queue,
            config,
            shutdown,
            consumer_name,
        }
    }

    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }

    /// Ask the loop to stop after the delivery in flight.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Handle to stop the loop from another task.
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown.clone()
    }

    /// Run until shutdown is requested.
    pub async fn run(&self) -> PipelineResult<()> {
        let queue_name = self.handler.queue().to_string();
        info!(
            stage = self.handler.stage(),
            queue = %queue_name,
            consumer = %self.consumer_name,
            "Starting stage executor"
        );
        self.queue.declare(&queue_name).await?;

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut last_claim = Instant::now();

        loop {
            if *shutdown_rx.borrow_and_update() {
                break;
            }

            if last_claim.elapsed() >= self.config.claim_interval {
                last_claim = Instant::now();
                if let Err(e) = self.claim_and_process(&queue_name).await {
                    warn!(error = %e, "Failed to claim stale deliveries");
                }
            }

            // Only the read is raced against shutdown; a delivery already
            // received is always settled.
            let consume = self.queue.consume(
                &queue_name,
                &self.consumer_name,
                PREFETCH,
                self.config.block,
            );
            let received = tokio::select! {
                _ = shutdown_rx.changed() => {
                    info!(stage = self.handler.stage(), "Shutdown signal received, stopping executor");
                    break;
                }
                result = consume => result,
            };

            match received {
                Ok(deliveries) => {
                    for delivery in deliveries {
                        self.process(delivery).await;
                    }
                }
                Err(e) => {
                    error!(error = %e, "Error consuming deliveries");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }

        info!(stage = self.handler.stage(), "Stage executor stopped");
        Ok(())
    }

    /// Read and process at most one delivery. Returns the number processed.
    pub async fn poll_once(&self, queue_name: &str, block: Duration) -> PipelineResult<usize> {
        let deliveries = self
            .queue
            .consume(queue_name, &self.consumer_name, PREFETCH, block)
            .await?;
        let count = deliveries.len();
        for delivery in deliveries {
            self.process(delivery).await;
        }
        Ok(count)
    }

    async fn claim_and_process(&self, queue_name: &str) -> PipelineResult<()> {
        let claimed = self
            .queue
            .claim_stale(
                queue_name,
                &self.consumer_name,
                self.config.claim_min_idle,
                PREFETCH,
            )
            .await?;
        if !claimed.is_empty() {
            info!(count = claimed.len(), "Claimed stale deliveries");
        }
        for delivery in claimed {
            self.process(delivery).await;
        }
        Ok(())
    }

    /// Hand one delivery to the stage, then settle it with the broker.
    async fn process(&self, delivery: Delivery) {
        let stage = self.handler.stage();
        debug!(stage, id = %delivery.id, redelivered = delivery.redelivered, "Processing delivery");

        match self.handler.handle(&delivery).await {
            Ok(()) => {
                record(stage, "handled");
                if let Err(e) = self.queue.ack(&delivery).await {
                    error!(stage, id = %delivery.id, error = %e, "Failed to ack delivery");
                }
            }
            Err(e) if e.is_malformed() => {
                record(stage, "malformed");
                match self.queue.reject(&delivery, &e.to_string()).await {
                    Ok(RejectOutcome::Requeued { attempt }) => {
                        warn!(stage, id = %delivery.id, attempt, error = %e, "Rejected malformed delivery")
                    }
                    Ok(RejectOutcome::DeadLettered) => {
                        warn!(stage, id = %delivery.id, error = %e, "Malformed delivery moved to DLQ")
                    }
                    Err(err) => {
                        error!(stage, id = %delivery.id, error = %err, "Failed to reject delivery")
                    }
                }
            }
            Err(e) => {
                // The task chain is dropped; the stage already recorded it.
                record(stage, "dropped");
                error!(stage, id = %delivery.id, error = %e, "Delivery dropped");
                if let Err(e) = self.queue.ack(&delivery).await {
                    error!(stage, id = %delivery.id, error = %e, "Failed to ack delivery");
                }
            }
        }
    }
}

fn record(stage: &'static str, result: &'static str) {
    counter!("stickerize_stage_deliveries_total", "stage" => stage, "result" => result).increment(1);
}
