//! In-process fakes for stage tests.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use sticker_chat::{
    ChatError, ChatPlatform, ChatResult, MediaInfo, OutboundMessage, UploadedMedia,
};
use sticker_media::{
    Codec, EncodeParams, MediaError, MediaResult, MetadataWriter, StickerPackMetadata,
};
use sticker_models::{
    ConversationRef, ConversionTask, DeliveryTask, ImageRules, MediaKind, MediaRef, MediaRules,
    TaskId, TelemetryEvent, VideoRules,
};
use sticker_queue::MemoryQueue;
use sticker_storage::{converted_key, raw_key, BlobStaging, LocalStaging};

use crate::config::WorkerConfig;
use crate::context::{PipelineContext, QueueNames};
use crate::conversion::ConversionEngine;
use crate::delivery::DeliveryWorker;
use crate::intake::{IntakeRequest, IntakeValidator};

/// Extended-format WebP of exactly `size` bytes: a VP8X chunk padded with an
/// unknown chunk.
pub fn webp_of_size(size: usize) -> Vec<u8> {
    let mut vp8x = Vec::new();
    vp8x.extend_from_slice(b"VP8X");
    vp8x.extend_from_slice(&10u32.to_le_bytes());
    vp8x.extend_from_slice(&[0u8; 4]);
    vp8x.extend_from_slice(&[0xFF, 0x01, 0x00]);
    vp8x.extend_from_slice(&[0xFF, 0x01, 0x00]);

    // RIFF header (12) + VP8X (18) + padding chunk header (8)
    let fixed = 12 + vp8x.len() + 8;
    let pad_len = size.saturating_sub(fixed) & !1;

    let mut riff = Vec::with_capacity(fixed + pad_len);
    riff.extend_from_slice(b"RIFF");
    riff.extend_from_slice(&((4 + vp8x.len() + 8 + pad_len) as u32).to_le_bytes());
    riff.extend_from_slice(b"WEBP");
    riff.extend_from_slice(&vp8x);
    riff.extend_from_slice(b"PAD ");
    riff.extend_from_slice(&(pad_len as u32).to_le_bytes());
    riff.resize(riff.len() + pad_len, 0);
    riff
}

/// Simple-format WebP with a `VP8 ` chunk of zeros.
pub fn corrupt_frame_webp() -> Vec<u8> {
    let mut riff = Vec::new();
    riff.extend_from_slice(b"RIFF");
    riff.extend_from_slice(&(4u32 + 8 + 16).to_le_bytes());
    riff.extend_from_slice(b"WEBP");
    riff.extend_from_slice(b"VP8 ");
    riff.extend_from_slice(&16u32.to_le_bytes());
    riff.extend_from_slice(&[0u8; 16]);
    riff
}

/// One scripted codec invocation.
#[derive(Debug, Clone, Copy)]
pub enum Scripted {
    /// Write an artifact of roughly this many bytes
    Bytes(usize),
    /// Write a simple-format WebP whose VP8 frame header is zeroed
    CorruptFrame,
    /// Exit non-zero
    Fail,
}

/// Codec that replays a script instead of running FFmpeg.
pub struct ScriptedCodec {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<EncodeParams>>,
    /// Reported duration; `None` makes the lookup fail
    duration: Mutex<Option<f64>>,
    duration_lookups: AtomicUsize,
}

impl ScriptedCodec {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
            duration: Mutex::new(Some(3.0)),
            duration_lookups: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> Vec<EncodeParams> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_duration(&self, seconds: Option<f64>) {
        *self.duration.lock().unwrap() = seconds;
    }

    pub fn duration_lookups(&self) -> usize {
        self.duration_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Codec for ScriptedCodec {
    async fn encode(&self, input: &Path, output: &Path, params: &EncodeParams) -> MediaResult<()> {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }
        self.calls.lock().unwrap().push(*params);
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Scripted::Bytes(size)) => {
                tokio::fs::write(output, webp_of_size(size)).await?;
                Ok(())
            }
            Some(Scripted::CorruptFrame) => {
                tokio::fs::write(output, corrupt_frame_webp()).await?;
                Ok(())
            }
            Some(Scripted::Fail) | None => Err(MediaError::ffmpeg_failed(
                "scripted failure",
                Some("Invalid data found when processing input".to_string()),
                Some(1),
            )),
        }
    }

    async fn duration(&self, input: &Path) -> MediaResult<f64> {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }
        self.duration_lookups.fetch_add(1, Ordering::SeqCst);
        let seconds = *self.duration.lock().unwrap();
        seconds.ok_or_else(|| MediaError::FfprobeFailed {
            message: "scripted duration failure".to_string(),
            stderr: None,
        })
    }
}

/// Chat platform that records traffic in memory.
#[derive(Default)]
pub struct FakeChat {
    media: Mutex<HashMap<String, (String, Vec<u8>)>>,
    sent: Mutex<Vec<(ConversationRef, OutboundMessage)>>,
    downloads: AtomicUsize,
    uploads: AtomicUsize,
    fail_uploads: AtomicBool,
}

impl FakeChat {
    pub fn add_media(&self, media_id: &str, mime_type: &str, data: Vec<u8>) {
        self.media
            .lock()
            .unwrap()
            .insert(media_id.to_string(), (mime_type.to_string(), data));
    }

    pub fn fail_uploads(&self) {
        self.fail_uploads.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(ConversationRef, OutboundMessage)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatPlatform for FakeChat {
    async fn media_info(&self, media: &MediaRef) -> ChatResult<MediaInfo> {
        let media_store = self.media.lock().unwrap();
        let (mime_type, data) = media_store
            .get(&media.media_id)
            .ok_or_else(|| ChatError::from_status(404, "unknown media"))?;
        Ok(MediaInfo {
            media_id: media.media_id.clone(),
            url: format!("fake://{}", media.media_id),
            mime_type: Some(mime_type.clone()),
            byte_length: data.len() as u64,
            sha256: None,
        })
    }

    async fn download(&self, info: &MediaInfo) -> ChatResult<Vec<u8>> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.media
            .lock()
            .unwrap()
            .get(&info.media_id)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| ChatError::from_status(404, "unknown media"))
    }

    async fn upload(&self, _data: Vec<u8>, _mime_type: &str) -> ChatResult<UploadedMedia> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(ChatError::from_status(500, "upload failed"));
        }
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(UploadedMedia::from_reference(format!("upload-{}", n)))
    }

    async fn send(
        &self,
        conversation: &ConversationRef,
        message: &OutboundMessage,
    ) -> ChatResult<String> {
        let mut sent = self.sent.lock().unwrap();
        sent.push((conversation.clone(), message.clone()));
        Ok(format!("wamid.sent-{}", sent.len()))
    }
}

/// A wired pipeline over fakes, a memory queue and a temp dir.
pub struct Harness {
    pub ctx: PipelineContext,
    pub queue: Arc<MemoryQueue>,
    pub staging: Arc<LocalStaging>,
    pub chat: Arc<FakeChat>,
    pub codec: Arc<ScriptedCodec>,
    pub dir: TempDir,
}

impl Harness {
    pub async fn new(script: Vec<Scripted>) -> Self {
        let dir = TempDir::new().unwrap();
        let queues = QueueNames::default();
        let queue = Arc::new(MemoryQueue::new(3));
        let staging = Arc::new(LocalStaging::new(dir.path().join("staging")));
        let chat = Arc::new(FakeChat::default());
        let codec = Arc::new(ScriptedCodec::new(script));

        let mut config = WorkerConfig::default();
        config.rules = MediaRules {
            image: ImageRules { max_bytes: 2_000_000 },
            video: VideoRules {
                max_bytes: 1_024_000,
                max_seconds: 7,
            },
        };
        config.conversion.work_dir = dir.path().join("work");

        let ctx = PipelineContext::new(
            &config,
            queues,
            queue.clone(),
            staging.clone(),
            chat.clone(),
            codec.clone(),
            MetadataWriter::new(&StickerPackMetadata::default()).unwrap(),
        );
        ctx.declare_queues().await.unwrap();

        Self {
            ctx,
            queue,
            staging,
            chat,
            codec,
            dir,
        }
    }

    pub fn intake(&self) -> IntakeValidator {
        IntakeValidator::new(self.ctx.clone())
    }

    pub fn engine(&self) -> ConversionEngine {
        ConversionEngine::new(self.ctx.clone())
    }

    pub fn delivery(&self) -> DeliveryWorker {
        DeliveryWorker::new(self.ctx.clone())
    }

    pub fn convert_tasks(&self) -> Vec<ConversionTask> {
        decode_all(self.queue.peek(&self.ctx.queues.convert))
    }

    pub fn deliver_tasks(&self) -> Vec<DeliveryTask> {
        decode_all(self.queue.peek(&self.ctx.queues.deliver))
    }

    pub fn telemetry(&self) -> Vec<TelemetryEvent> {
        decode_all(self.queue.peek(&self.ctx.queues.telemetry))
    }

    /// Whether the conversion scratch directory holds no leftovers.
    pub fn scratch_is_empty(&self) -> bool {
        match std::fs::read_dir(&self.ctx.work_dir) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }
}

fn decode_all<T: serde::de::DeserializeOwned>(payloads: Vec<Vec<u8>>) -> Vec<T> {
    payloads
        .iter()
        .map(|p| serde_json::from_slice(p).unwrap())
        .collect()
}

fn request(
    task_id: &str,
    media_id: &str,
    kind: &str,
    mime: &str,
    declared: Option<u64>,
) -> IntakeRequest {
    IntakeRequest {
        task_id: TaskId::from_string(task_id),
        media: MediaRef {
            media_id: media_id.to_string(),
            platform_type: kind.to_string(),
            mime_type: Some(mime.to_string()),
            declared_byte_length: declared,
            declared_duration_seconds: None,
        },
        conversation_ref: ConversationRef::new(b"447700900000".to_vec()),
        is_group_conversation: false,
        sender_id: "447700900000".to_string(),
        requested_at: "2024-01-01T00:00:00+00:00".to_string(),
        message_id: Some(task_id.to_string()),
    }
}

pub fn image_request(task_id: &str, media_id: &str, declared: Option<u64>) -> IntakeRequest {
    request(task_id, media_id, "image", "image/jpeg", declared)
}

pub fn video_request(task_id: &str, media_id: &str, declared: Option<u64>) -> IntakeRequest {
    request(task_id, media_id, "video", "video/mp4", declared)
}

/// Stage raw media and build the conversion task intake would have queued.
pub async fn staged_task(
    harness: &Harness,
    task_id: &str,
    kind: MediaKind,
    source_byte_length: u64,
) -> ConversionTask {
    let id = TaskId::from_string(task_id);
    let media_path = raw_key(kind, &id, kind.canonical_extension());
    harness
        .staging
        .put(&media_path, b"raw media bytes".to_vec())
        .await
        .unwrap();
    ConversionTask {
        output_path: converted_key(kind, &id),
        task_id: id,
        media_path,
        source_byte_length,
        media_kind: kind,
        conversation_ref: ConversationRef::new(b"120363000000@g.us".to_vec()),
        is_group_conversation: false,
        sender_id: "2348012345678".to_string(),
        requested_at: "2024-01-01T00:00:00+00:00".to_string(),
        reply_to: Some(task_id.to_string()),
    }
}

/// Stage an artifact and build the delivery task conversion would have queued.
pub async fn staged_delivery(
    harness: &Harness,
    task_id: &str,
    kind: MediaKind,
    is_group_conversation: bool,
    artifact_bytes: usize,
) -> DeliveryTask {
    let mut task = staged_task(harness, task_id, kind, 900_000).await;
    harness.staging.delete(&task.media_path).await.unwrap();
    task.is_group_conversation = is_group_conversation;
    harness
        .staging
        .put(&task.output_path, vec![0u8; artifact_bytes])
        .await
        .unwrap();
    DeliveryTask::from_conversion(task, artifact_bytes as u64)
}
