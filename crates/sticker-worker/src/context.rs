//! Shared handles passed to every stage constructor.

use std::path::PathBuf;
use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use sticker_chat::{ChatPlatform, OutboundMessage};
use sticker_media::{Codec, MetadataWriter, QualityLadder};
use sticker_models::{ConversationRef, MediaRules, TelemetryEvent};
use sticker_queue::{publish_json, QueueConfig, TaskQueue};
use sticker_storage::BlobStaging;

use crate::config::{DeliveryConfig, WorkerConfig};

/// Reply sent when a conversion or delivery failed and failure notices are on.
pub const FAILURE_NOTICE: &str = "Sorry I ran into troubles stickerizing that";

/// Names of the three pipeline queues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueNames {
    /// Queue A: conversion tasks
    pub convert: String,
    /// Queue B: delivery tasks
    pub deliver: String,
    /// Queue C: telemetry events
    pub telemetry: String,
}

impl QueueNames {
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            convert: config.convert_queue.clone(),
            deliver: config.deliver_queue.clone(),
            telemetry: config.telemetry_queue.clone(),
        }
    }

    pub fn all(&self) -> [&str; 3] {
        [&self.convert, &self.deliver, &self.telemetry]
    }
}

impl Default for QueueNames {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}

/// Everything a stage needs, built once per process.
#[derive(Clone)]
pub struct PipelineContext {
    pub queue: Arc<dyn TaskQueue>,
    pub staging: Arc<dyn BlobStaging>,
    pub chat: Arc<dyn ChatPlatform>,
    pub codec: Arc<dyn Codec>,
    pub metadata: MetadataWriter,
    pub queues: QueueNames,
    pub rules: MediaRules,
    pub ladder: QualityLadder,
    pub delivery: DeliveryConfig,
    pub work_dir: PathBuf,
}

impl PipelineContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &WorkerConfig,
        queues: QueueNames,
        queue: Arc<dyn TaskQueue>,
        staging: Arc<dyn BlobStaging>,
        chat: Arc<dyn ChatPlatform>,
        codec: Arc<dyn Codec>,
        metadata: MetadataWriter,
    ) -> Self {
        Self {
            queue,
            staging,
            chat,
            codec,
            metadata,
            queues,
            rules: config.rules,
            ladder: config.conversion.ladder.clone(),
            delivery: config.delivery,
            work_dir: config.conversion.work_dir.clone(),
        }
    }

    /// Declare every pipeline queue.
    pub async fn declare_queues(&self) -> sticker_queue::QueueResult<()> {
        for name in self.queues.all() {
            self.queue.declare(name).await?;
        }
        Ok(())
    }

    /// Publish a telemetry event. The feed is lossy, so failures are logged
    /// and swallowed.
    pub async fn publish_telemetry(&self, event: &TelemetryEvent) {
        match publish_json(self.queue.as_ref(), &self.queues.telemetry, event).await {
            Ok(id) => debug!(message_id = %id, validated = event.validated, "Published telemetry"),
            Err(e) => {
                counter!("stickerize_telemetry_dropped_total").increment(1);
                warn!(error = %e, "Failed to publish telemetry event");
            }
        }
    }

    /// Quote `message_id` when reply-to is enabled.
    pub fn reply_context(&self, message_id: Option<&str>) -> Option<String> {
        if self.delivery.reply_to {
            message_id.map(str::to_string)
        } else {
            None
        }
    }

    /// Best-effort text reply into a conversation.
    pub async fn reply(
        &self,
        conversation: &ConversationRef,
        body: &str,
        reply_to: Option<String>,
    ) -> bool {
        let message = OutboundMessage::text(body).replying_to(reply_to);
        match self.chat.send(conversation, &message).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Failed to send reply");
                false
            }
        }
    }

    /// Send the generic failure notice when enabled.
    pub async fn notify_failure(&self, conversation: &ConversationRef, reply_to: Option<String>) {
        if self.delivery.notify_on_failure {
            self.reply(conversation, FAILURE_NOTICE, reply_to).await;
        }
    }

    /// Remove a staged object, logging instead of failing.
    pub async fn discard(&self, key: &str) {
        if let Err(e) = self.staging.delete(key).await {
            warn!(key, error = %e, "Failed to remove staged object");
        }
    }
}
