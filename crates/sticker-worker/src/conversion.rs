//! Conversion stage: encode staged media until the artifact fits its ceiling
//! or the quality ladder runs out.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use metrics::{counter, histogram};
use tracing::{debug, info, warn, Instrument};

use sticker_media::EncodeParams;
use sticker_models::{ConversionState, ConversionTask, DeliveryTask, MediaKind, TelemetryEvent};
use sticker_queue::{publish_json, Delivery};

use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};
use crate::executor::StageHandler;
use crate::logging::TaskLogger;

/// Result of converting one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionReport {
    /// Terminal state reached
    pub state: ConversionState,
    /// Codec invocations made
    pub attempts: u32,
    /// Size of the forwarded artifact, set only when satisfied
    pub artifact_byte_length: Option<u64>,
    /// States passed through, from `Pending` to the terminal one
    pub history: Vec<ConversionState>,
}

impl ConversionReport {
    fn new(state: ConversionState, attempts: u32) -> Self {
        Self {
            state,
            attempts,
            artifact_byte_length: None,
            history: Vec::new(),
        }
    }
}

/// Append `next` to the trail if it is a legal successor.
fn advance(history: &mut Vec<ConversionState>, next: ConversionState) {
    let current = history.last().copied().unwrap_or_default();
    if current == next {
        return;
    }
    if !current.can_advance_to(next) {
        warn!(from = current.as_str(), to = next.as_str(), "Illegal conversion transition");
        return;
    }
    debug!(from = current.as_str(), to = next.as_str(), "Conversion state");
    history.push(next);
}

/// Outcome of the encode loop.
enum EncodeOutcome {
    Satisfied { path: PathBuf, bytes: u64, attempts: u32 },
    /// Ladder exhausted; `bytes` is the size of the last attempt
    Oversized { bytes: u64, attempts: u32 },
}

/// Runs the quality ladder for conversion tasks.
pub struct ConversionEngine {
    ctx: PipelineContext,
}

impl ConversionEngine {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    /// Convert one task to its terminal state.
    ///
    /// The raw staged media and every scratch file are gone once this
    /// returns. Non-satisfied outcomes publish one failed telemetry event.
    pub async fn convert(&self, task: &ConversionTask) -> ConversionReport {
        let logger = TaskLogger::new(&task.task_id, "conversion");
        let span = logger.create_span();
        async {
            logger.log_start(&format!(
                "{} of {} bytes from {}",
                task.media_kind, task.source_byte_length, task.media_path
            ));

            let mut history = vec![ConversionState::Pending];
            let mut report = match self.run(task, &logger, &mut history).await {
                Ok(report) => report,
                Err(e) => {
                    if e.is_codec_failure() {
                        logger.log_warning(&format!("codec failure: {}", e));
                    } else {
                        logger.log_error(&e.to_string());
                    }
                    ConversionReport::new(ConversionState::Failed, 0)
                }
            };
            advance(&mut history, report.state);
            report.history = history;

            self.ctx.discard(&task.media_path).await;
            counter!(
                "stickerize_conversions_total",
                "media_kind" => task.media_kind.as_str(),
                "state" => report.state.as_str()
            )
            .increment(1);

            if report.state == ConversionState::Satisfied {
                logger.log_completion(&format!(
                    "{} bytes after {} attempt(s)",
                    report.artifact_byte_length.unwrap_or_default(),
                    report.attempts
                ));
            } else {
                self.ctx.publish_telemetry(&TelemetryEvent::failed(task)).await;
                self.ctx
                    .notify_failure(&task.conversation_ref, task.reply_to.clone())
                    .await;
            }
            report
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        task: &ConversionTask,
        logger: &TaskLogger,
        history: &mut Vec<ConversionState>,
    ) -> PipelineResult<ConversionReport> {
        tokio::fs::create_dir_all(&self.ctx.work_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix("sticker-")
            .tempdir_in(&self.ctx.work_dir)?;

        let raw = self.ctx.staging.get(&task.media_path).await?;
        let input = scratch
            .path()
            .join(format!("input{}", input_extension(&task.media_path)));
        tokio::fs::write(&input, &raw).await?;
        drop(raw);

        advance(history, ConversionState::Encoding);
        let outcome = self.encode_until_fits(task, &input, scratch.path(), logger).await?;
        let (path, bytes, attempts) = match outcome {
            EncodeOutcome::Satisfied {
                path,
                bytes,
                attempts,
            } => (path, bytes, attempts),
            EncodeOutcome::Oversized { bytes, attempts } => {
                // Images get a single pass; an oversized image is a failure,
                // an oversized video has exhausted its ladder.
                let state = match task.media_kind {
                    MediaKind::Image => ConversionState::Failed,
                    MediaKind::Video => ConversionState::Exhausted,
                };
                logger.log_warning(&format!(
                    "{} bytes still over the {} byte ceiling after {} attempt(s)",
                    bytes,
                    self.ctx.rules.max_bytes(task.media_kind),
                    attempts
                ));
                return Ok(ConversionReport::new(state, attempts));
            }
        };

        let artifact = tokio::fs::read(&path).await?;
        self.ctx.staging.put(&task.output_path, artifact).await?;

        let delivery = DeliveryTask::from_conversion(task.clone(), bytes);
        let published =
            publish_json(self.ctx.queue.as_ref(), &self.ctx.queues.deliver, &delivery).await;
        if let Err(e) = published {
            self.ctx.discard(&task.output_path).await;
            return Err(e.into());
        }
        debug!(task_id = %task.task_id, output = %task.output_path, "Published delivery task");

        Ok(ConversionReport {
            state: ConversionState::Satisfied,
            attempts,
            artifact_byte_length: Some(bytes),
            history: Vec::new(),
        })
    }

    /// Walk the ladder. Each rung encodes, tags the artifact with the sticker
    /// pack metadata and measures it against the ceiling.
    async fn encode_until_fits(
        &self,
        task: &ConversionTask,
        input: &Path,
        scratch: &Path,
        logger: &TaskLogger,
    ) -> PipelineResult<EncodeOutcome> {
        let rungs = self.ctx.ladder.rungs(task.media_kind, task.source_byte_length);
        let mut last_bytes = 0;
        let mut attempts = 0;

        for params in rungs {
            attempts += 1;
            let output = scratch.join(format!("attempt-{}.webp", params.attempt));
            let bytes = self.encode_once(input, &output, &params).await?;
            histogram!(
                "stickerize_artifact_bytes",
                "media_kind" => task.media_kind.as_str()
            )
            .record(bytes as f64);

            if self.ctx.rules.fits(task.media_kind, bytes) {
                return Ok(EncodeOutcome::Satisfied {
                    path: output,
                    bytes,
                    attempts,
                });
            }

            logger.log_progress(&format!(
                "attempt {} at quality {} produced {} bytes, over ceiling",
                params.attempt, params.quality, bytes
            ));
            last_bytes = bytes;
            tokio::fs::remove_file(&output).await?;
        }

        Ok(EncodeOutcome::Oversized {
            bytes: last_bytes,
            attempts,
        })
    }

    async fn encode_once(
        &self,
        input: &Path,
        output: &Path,
        params: &EncodeParams,
    ) -> PipelineResult<u64> {
        info!(
            attempt = params.attempt,
            quality = params.quality,
            compression_level = params.compression_level,
            "Encoding"
        );
        self.ctx.codec.encode(input, output, params).await?;
        let bytes = self
            .ctx
            .metadata
            .embed_file(output)
            .await
            .map_err(|e| PipelineError::codec(format!("artifact is not a valid WebP: {}", e)))?;
        Ok(bytes)
    }
}

/// Extension of a staged key, with the leading dot.
fn input_extension(key: &str) -> String {
    Path::new(key)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default()
}

#[async_trait]
impl StageHandler for ConversionEngine {
    fn stage(&self) -> &'static str {
        "conversion"
    }

    fn queue(&self) -> &str {
        &self.ctx.queues.convert
    }

    async fn handle(&self, delivery: &Delivery) -> PipelineResult<()> {
        let task: ConversionTask = delivery
            .decode()
            .map_err(|e| PipelineError::malformed(e.to_string()))?;
        self.convert(&task).await;
        Ok(())
    }
}
