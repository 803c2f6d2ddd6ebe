//! Delivery stage: upload the artifact and message it into the conversation.

use async_trait::async_trait;
use metrics::counter;
use tracing::Instrument;

use sticker_chat::{OutboundMessage, StickerMessage};
use sticker_models::{DeliveryTask, TelemetryEvent};
use sticker_queue::Delivery;

use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};
use crate::executor::StageHandler;
use crate::logging::TaskLogger;

/// Text sent after the sticker when the notice policy asks for it.
pub const COMPLETION_NOTICE: &str = "Done Stickerizing";

const WEBP_MIME: &str = "image/webp";

/// Uploads converted stickers and reports the outcome.
pub struct DeliveryWorker {
    ctx: PipelineContext,
}

impl DeliveryWorker {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    /// Deliver one artifact. Returns whether the sticker reached the
    /// conversation.
    ///
    /// The staged artifact is removed after the attempt whatever the outcome,
    /// and exactly one telemetry event is published.
    pub async fn deliver(&self, task: &DeliveryTask) -> bool {
        let logger = TaskLogger::new(task.task_id(), "delivery");
        let span = logger.create_span();
        async {
            logger.log_start(&format!("artifact {}", task.task.output_path));

            let result = self.send_sticker(task, &logger).await;
            self.ctx.discard(&task.task.output_path).await;

            let delivered = match result {
                Ok(final_byte_length) => {
                    logger.log_completion(&format!("sent {} bytes", final_byte_length));
                    self.ctx
                        .publish_telemetry(&TelemetryEvent::delivered(&task.task, final_byte_length))
                        .await;
                    true
                }
                Err(e) => {
                    logger.log_error(&e.to_string());
                    self.ctx
                        .publish_telemetry(&TelemetryEvent::failed(&task.task))
                        .await;
                    self.ctx
                        .notify_failure(&task.task.conversation_ref, task.task.reply_to.clone())
                        .await;
                    false
                }
            };

            counter!(
                "stickerize_deliveries_total",
                "media_kind" => task.task.media_kind.as_str(),
                "result" => if delivered { "sent" } else { "failed" }
            )
            .increment(1);
            delivered
        }
        .instrument(span)
        .await
    }

    async fn send_sticker(&self, task: &DeliveryTask, logger: &TaskLogger) -> PipelineResult<u64> {
        let artifact = self.ctx.staging.get(&task.task.output_path).await?;
        let final_byte_length = artifact.len() as u64;

        let media = self.ctx.chat.upload(artifact, WEBP_MIME).await?;
        logger.log_progress(&format!("uploaded as {}", media.reference));

        let sticker = OutboundMessage::sticker(StickerMessage {
            media,
            mime_type: WEBP_MIME.to_string(),
            file_length: final_byte_length,
            animated: task.task.media_kind.is_animated(),
        })
        .replying_to(task.task.reply_to.clone());
        self.ctx
            .chat
            .send(&task.task.conversation_ref, &sticker)
            .await?;

        if self.ctx.delivery.completion_notice(task.task.is_group_conversation) {
            // The sticker is already delivered; a lost notice is not a failure.
            self.ctx
                .reply(
                    &task.task.conversation_ref,
                    COMPLETION_NOTICE,
                    task.task.reply_to.clone(),
                )
                .await;
        }

        Ok(final_byte_length)
    }
}

#[async_trait]
impl StageHandler for DeliveryWorker {
    fn stage(&self) -> &'static str {
        "delivery"
    }

    fn queue(&self) -> &str {
        &self.ctx.queues.deliver
    }

    async fn handle(&self, delivery: &Delivery) -> PipelineResult<()> {
        let task: DeliveryTask = delivery
            .decode()
            .map_err(|e| PipelineError::malformed(e.to_string()))?;
        self.deliver(&task).await;
        Ok(())
    }
}
