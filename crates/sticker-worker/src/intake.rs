//! Intake: decide accept or reject from the declared metadata, then stage
//! the raw media and enqueue a conversion task.
//!
//! Video that arrives without a declared duration is probed after download
//! and before anything is staged.

use metrics::counter;
use tracing::{debug, info, warn, Instrument};

use sticker_models::{
    ConversationRef, ConversionTask, MediaKind, MediaRef, RuleViolation, TaskId, TelemetryEvent,
};
use sticker_queue::publish_json;
use sticker_storage::{converted_key, raw_key};

use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::TaskLogger;

/// Reply for media the pipeline cannot turn into a sticker.
pub const UNSUPPORTED_MEDIA_NOTICE: &str =
    "Bot currently supports sticker creation from (video/images) only";

/// A stickerize request extracted from an inbound message.
#[derive(Debug, Clone)]
pub struct IntakeRequest {
    /// Unique per request, usually the platform message id
    pub task_id: TaskId,
    pub media: MediaRef,
    pub conversation_ref: ConversationRef,
    pub is_group_conversation: bool,
    pub sender_id: String,
    pub requested_at: String,
    /// Message that triggered the request
    pub message_id: Option<String>,
}

/// Terminal decision of the intake stage.
#[derive(Debug, Clone, PartialEq)]
pub enum IntakeOutcome {
    /// Staged and published to the conversion queue
    Accepted(ConversionTask),
    /// Ceiling violated; the user was told why
    Rejected(RuleViolation),
    /// Not an image or video
    Unsupported,
}

/// Validates requests against the media rules and produces conversion tasks.
pub struct IntakeValidator {
    ctx: PipelineContext,
}

impl IntakeValidator {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    /// Process one request.
    ///
    /// Every path publishes exactly one telemetry event. Platform lookup,
    /// download, scratch IO, staging or publish failures are returned to the caller after
    /// the failure event is recorded and any staged file is removed.
    pub async fn submit(&self, request: IntakeRequest) -> PipelineResult<IntakeOutcome> {
        let logger = TaskLogger::new(&request.task_id, "intake");
        let span = logger.create_span();
        self.submit_inner(request, &logger).instrument(span).await
    }

    async fn submit_inner(
        &self,
        request: IntakeRequest,
        logger: &TaskLogger,
    ) -> PipelineResult<IntakeOutcome> {
        let reply_to = self.ctx.reply_context(request.message_id.as_deref());

        let Some(kind) = request.media.media_kind() else {
            info!(
                task_id = %request.task_id,
                platform_type = %request.media.platform_type,
                "Unsupported media"
            );
            counter!("stickerize_intake_total", "outcome" => "unsupported").increment(1);
            self.ctx
                .reply(&request.conversation_ref, UNSUPPORTED_MEDIA_NOTICE, reply_to)
                .await;
            self.ctx
                .publish_telemetry(&rejected_event(&request, None, 0))
                .await;
            return Ok(IntakeOutcome::Unsupported);
        };

        logger.log_start(&format!("{} {}", kind, request.media.media_id));

        // The declared size decides acceptance; it is never guessed.
        let (declared_bytes, info) = match request.media.declared_byte_length {
            Some(bytes) => (bytes, None),
            None => match self.ctx.chat.media_info(&request.media).await {
                Ok(info) => (info.byte_length, Some(info)),
                Err(e) => {
                    logger.log_error(&format!("media lookup failed: {}", e));
                    self.record_failure(&request, kind, 0, None).await;
                    return Err(e.into());
                }
            },
        };

        if let Err(violation) = self.ctx.rules.check(
            kind,
            declared_bytes,
            request.media.declared_duration_seconds,
        ) {
            return Ok(self.reject(&request, kind, violation, declared_bytes, reply_to).await);
        }

        let media_path = raw_key(kind, &request.task_id, request.media.extension(kind));
        let data = match self.fetch(&request, info).await {
            Ok(data) => data,
            Err(e) => {
                logger.log_error(&format!("download failed: {}", e));
                self.record_failure(&request, kind, declared_bytes, None).await;
                return Err(e);
            }
        };
        if data.len() as u64 != declared_bytes {
            info!(
                task_id = %request.task_id,
                declared = declared_bytes,
                actual = data.len(),
                "Downloaded size differs from declared size"
            );
        }

        if kind == MediaKind::Video && request.media.declared_duration_seconds.is_none() {
            match self.probed_violation(&request, &data).await {
                Ok(Some(violation)) => {
                    let bytes = data.len() as u64;
                    return Ok(self.reject(&request, kind, violation, bytes, reply_to).await);
                }
                Ok(None) => {}
                Err(e) => {
                    logger.log_error(&format!("duration probe failed: {}", e));
                    self.record_failure(&request, kind, declared_bytes, None).await;
                    return Err(e);
                }
            }
        }

        match self
            .stage_and_publish(&request, kind, data, &media_path, reply_to)
            .await
        {
            Ok(task) => {
                counter!("stickerize_intake_total", "outcome" => "accepted").increment(1);
                logger.log_completion(&format!(
                    "queued {} bytes as {}",
                    task.source_byte_length, task.media_path
                ));
                Ok(IntakeOutcome::Accepted(task))
            }
            Err(e) => {
                logger.log_error(&format!("staging failed: {}", e));
                self.record_failure(&request, kind, declared_bytes, Some(&media_path))
                    .await;
                Err(e)
            }
        }
    }

    /// Tell the user why, record the rejection and stop.
    async fn reject(
        &self,
        request: &IntakeRequest,
        kind: MediaKind,
        violation: RuleViolation,
        byte_length: u64,
        reply_to: Option<String>,
    ) -> IntakeOutcome {
        info!(task_id = %request.task_id, reason = %violation, "Rejected at intake");
        counter!("stickerize_intake_total", "outcome" => "rejected").increment(1);
        self.ctx
            .reply(&request.conversation_ref, &violation.user_message(), reply_to)
            .await;
        self.ctx
            .publish_telemetry(&rejected_event(request, Some(kind), byte_length))
            .await;
        IntakeOutcome::Rejected(violation)
    }

    async fn record_failure(
        &self,
        request: &IntakeRequest,
        kind: MediaKind,
        byte_length: u64,
        staged: Option<&str>,
    ) {
        counter!("stickerize_intake_total", "outcome" => "failed").increment(1);
        if let Some(key) = staged {
            self.ctx.discard(key).await;
        }
        self.ctx
            .publish_telemetry(&rejected_event(request, Some(kind), byte_length))
            .await;
    }

    async fn fetch(
        &self,
        request: &IntakeRequest,
        info: Option<sticker_chat::MediaInfo>,
    ) -> PipelineResult<Vec<u8>> {
        let info = match info {
            Some(info) => info,
            None => self.ctx.chat.media_info(&request.media).await?,
        };
        let data = self.ctx.chat.download(&info).await?;
        if data.is_empty() {
            return Err(PipelineError::transient_io("downloaded media is empty"));
        }
        Ok(data)
    }

    /// Duration check for video the platform sent without a length.
    ///
    /// The bytes are written to a scratch file for the probe. A file the
    /// prober cannot read is left for the codec to accept or fail.
    async fn probed_violation(
        &self,
        request: &IntakeRequest,
        data: &[u8],
    ) -> PipelineResult<Option<RuleViolation>> {
        tokio::fs::create_dir_all(&self.ctx.work_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix("probe-")
            .tempdir_in(&self.ctx.work_dir)?;
        let input = scratch
            .path()
            .join(format!("input{}", request.media.extension(MediaKind::Video)));
        tokio::fs::write(&input, data).await?;

        let seconds = match self.ctx.codec.duration(&input).await {
            Ok(seconds) => seconds,
            Err(e) => {
                warn!(task_id = %request.task_id, error = %e, "Could not probe video duration");
                return Ok(None);
            }
        };
        debug!(task_id = %request.task_id, seconds, "Probed video duration");

        // Whole seconds, as the platform reports them.
        let whole_seconds = seconds.floor().min(f64::from(u32::MAX)) as u32;
        Ok(self
            .ctx
            .rules
            .check(MediaKind::Video, 0, Some(whole_seconds))
            .err())
    }

    async fn stage_and_publish(
        &self,
        request: &IntakeRequest,
        kind: MediaKind,
        data: Vec<u8>,
        media_path: &str,
        reply_to: Option<String>,
    ) -> PipelineResult<ConversionTask> {
        let source_byte_length = data.len() as u64;
        self.ctx.staging.put(media_path, data).await?;

        let task = ConversionTask {
            task_id: request.task_id.clone(),
            media_path: media_path.to_string(),
            output_path: converted_key(kind, &request.task_id),
            source_byte_length,
            media_kind: kind,
            conversation_ref: request.conversation_ref.clone(),
            is_group_conversation: request.is_group_conversation,
            sender_id: request.sender_id.clone(),
            requested_at: request.requested_at.clone(),
            reply_to,
        };
        publish_json(self.ctx.queue.as_ref(), &self.ctx.queues.convert, &task).await?;
        Ok(task)
    }
}

fn rejected_event(
    request: &IntakeRequest,
    kind: Option<MediaKind>,
    initial_byte_length: u64,
) -> TelemetryEvent {
    TelemetryEvent::rejected(
        kind,
        initial_byte_length,
        request.is_group_conversation,
        request.sender_id.clone(),
        request.requested_at.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{image_request, video_request, Harness};
    use sticker_chat::OutboundMessage;
    use sticker_storage::BlobStaging;

    #[tokio::test]
    async fn test_image_within_ceiling_is_accepted() {
        let harness = Harness::new(vec![]).await;
        harness.chat.add_media("img-1", "image/jpeg", vec![7u8; 1_500_000]);

        let outcome = harness
            .intake()
            .submit(image_request("wamid.A", "img-1", Some(1_500_000)))
            .await
            .unwrap();

        let IntakeOutcome::Accepted(task) = outcome else {
            panic!("expected acceptance");
        };
        assert_eq!(task.media_kind, MediaKind::Image);
        assert_eq!(task.media_path, "images/raw/wamid.A.jpg");
        assert_eq!(task.output_path, "images/converted/wamid.A.webp");
        assert_eq!(task.source_byte_length, 1_500_000);
        assert_eq!(task.reply_to.as_deref(), Some("wamid.A"));

        assert_eq!(harness.convert_tasks().len(), 1);
        assert!(harness.staging.exists(&task.media_path).await.unwrap());
        assert!(harness.chat.sent().is_empty());
        assert!(harness.telemetry().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_image_is_rejected_before_download() {
        let harness = Harness::new(vec![]).await;

        let outcome = harness
            .intake()
            .submit(image_request("wamid.B", "img-2", Some(3_000_000)))
            .await
            .unwrap();

        assert!(matches!(outcome, IntakeOutcome::Rejected(RuleViolation::TooLarge { .. })));
        assert!(harness.convert_tasks().is_empty());
        assert_eq!(harness.chat.downloads(), 0);

        let sent = harness.chat.sent();
        assert_eq!(sent.len(), 1);
        assert!(matches!(
            &sent[0].1,
            OutboundMessage::Text { body, .. } if body == "Your image is larger than 2MB"
        ));

        let events = harness.telemetry();
        assert_eq!(events.len(), 1);
        assert!(!events[0].validated);
        assert_eq!(events[0].initial_byte_length, 3_000_000);
    }

    #[tokio::test]
    async fn test_long_video_is_rejected() {
        let harness = Harness::new(vec![]).await;
        let mut request = video_request("wamid.C", "vid-1", Some(500_000));
        request.media.declared_duration_seconds = Some(12);

        let outcome = harness.intake().submit(request).await.unwrap();

        assert!(matches!(outcome, IntakeOutcome::Rejected(RuleViolation::TooLong { .. })));
        let sent = harness.chat.sent();
        assert!(matches!(
            &sent[0].1,
            OutboundMessage::Text { body, .. } if body == "Your video is longer than 7 seconds"
        ));
        assert_eq!(harness.telemetry().len(), 1);
    }

    #[tokio::test]
    async fn test_undeclared_long_video_is_rejected() {
        let harness = Harness::new(vec![]).await;
        harness.chat.add_media("vid-9", "video/mp4", vec![3u8; 400_000]);
        harness.codec.set_duration(Some(60.2));

        let outcome = harness
            .intake()
            .submit(video_request("wamid.L", "vid-9", Some(400_000)))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            IntakeOutcome::Rejected(RuleViolation::TooLong {
                actual_seconds: 60,
                max_seconds: 7
            })
        );
        assert_eq!(harness.codec.duration_lookups(), 1);
        assert!(harness.convert_tasks().is_empty());
        assert!(!harness
            .staging
            .exists("videos/raw/wamid.L.mp4")
            .await
            .unwrap());
        assert!(harness.scratch_is_empty());

        let sent = harness.chat.sent();
        assert!(matches!(
            &sent[0].1,
            OutboundMessage::Text { body, .. } if body == "Your video is longer than 7 seconds"
        ));
        let events = harness.telemetry();
        assert_eq!(events.len(), 1);
        assert!(!events[0].validated);
        assert_eq!(events[0].initial_byte_length, 400_000);
    }

    #[tokio::test]
    async fn test_undeclared_short_video_is_accepted() {
        let harness = Harness::new(vec![]).await;
        harness.chat.add_media("vid-8", "video/mp4", vec![3u8; 400_000]);
        harness.codec.set_duration(Some(7.9));

        let outcome = harness
            .intake()
            .submit(video_request("wamid.M", "vid-8", Some(400_000)))
            .await
            .unwrap();

        assert!(matches!(outcome, IntakeOutcome::Accepted(_)));
        assert_eq!(harness.convert_tasks().len(), 1);
        assert!(harness.telemetry().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_duration_is_left_to_codec() {
        let harness = Harness::new(vec![]).await;
        harness.chat.add_media("vid-7", "video/mp4", vec![3u8; 400_000]);
        harness.codec.set_duration(None);

        let outcome = harness
            .intake()
            .submit(video_request("wamid.N", "vid-7", Some(400_000)))
            .await
            .unwrap();

        assert!(matches!(outcome, IntakeOutcome::Accepted(_)));
        assert_eq!(harness.codec.duration_lookups(), 1);
    }

    #[tokio::test]
    async fn test_declared_duration_is_trusted() {
        let harness = Harness::new(vec![]).await;
        harness.chat.add_media("vid-6", "video/mp4", vec![3u8; 400_000]);
        harness.codec.set_duration(Some(60.0));
        let mut request = video_request("wamid.O", "vid-6", Some(400_000));
        request.media.declared_duration_seconds = Some(5);

        let outcome = harness.intake().submit(request).await.unwrap();

        assert!(matches!(outcome, IntakeOutcome::Accepted(_)));
        assert_eq!(harness.codec.duration_lookups(), 0);
    }

    #[tokio::test]
    async fn test_missing_size_is_looked_up() {
        let harness = Harness::new(vec![]).await;
        harness.chat.add_media("vid-2", "video/mp4", vec![1u8; 2_000_000]);

        let outcome = harness
            .intake()
            .submit(video_request("wamid.D", "vid-2", None))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            IntakeOutcome::Rejected(RuleViolation::TooLarge { actual_bytes: 2_000_000, .. })
        ));
        assert_eq!(harness.chat.downloads(), 0);
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates_with_telemetry() {
        let harness = Harness::new(vec![]).await;

        let result = harness
            .intake()
            .submit(video_request("wamid.E", "unknown-media", None))
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, PipelineError::Chat(_)));
        assert!(harness.chat.sent().is_empty());
        assert!(harness.convert_tasks().is_empty());
        assert_eq!(harness.telemetry().len(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_media_gets_notice() {
        let harness = Harness::new(vec![]).await;
        let mut request = image_request("wamid.F", "doc-1", Some(10));
        request.media.platform_type = "document".to_string();

        let outcome = harness.intake().submit(request).await.unwrap();

        assert_eq!(outcome, IntakeOutcome::Unsupported);
        let sent = harness.chat.sent();
        assert!(matches!(
            &sent[0].1,
            OutboundMessage::Text { body, .. } if body == UNSUPPORTED_MEDIA_NOTICE
        ));
        let events = harness.telemetry();
        assert_eq!(events[0].media_kind, None);
    }

    #[tokio::test]
    async fn test_download_failure_leaves_nothing_staged() {
        let harness = Harness::new(vec![]).await;
        harness.chat.add_media("img-3", "image/jpeg", Vec::new());

        let request = image_request("wamid.G", "img-3", Some(100));
        let result = harness.intake().submit(request).await;

        assert!(matches!(result, Err(PipelineError::TransientIo(_))));
        assert!(!harness
            .staging
            .exists("images/raw/wamid.G.jpg")
            .await
            .unwrap());
        assert_eq!(harness.telemetry().len(), 1);
    }
}
