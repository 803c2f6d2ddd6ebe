//! Gateway state over in-memory collaborators.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use sticker_chat::{
    ChatPlatform, ChatResult, MediaInfo, OutboundMessage, UploadedMedia,
};
use sticker_media::{FfmpegCodec, MetadataWriter, StickerPackMetadata};
use sticker_models::{ConversationRef, MediaRef};
use sticker_queue::MemoryQueue;
use sticker_storage::LocalStaging;
use sticker_worker::{IntakeValidator, PipelineContext, QueueNames, WorkerConfig};

use crate::config::GatewayConfig;
use crate::state::AppState;

/// Platform where every media id resolves to 100 bytes.
#[derive(Default)]
pub struct StubChat {
    pub sent: Mutex<Vec<(ConversationRef, OutboundMessage)>>,
}

#[async_trait]
impl ChatPlatform for StubChat {
    async fn media_info(&self, media: &MediaRef) -> ChatResult<MediaInfo> {
        Ok(MediaInfo {
            media_id: media.media_id.clone(),
            url: format!("stub://{}", media.media_id),
            mime_type: media.mime_type.clone(),
            byte_length: 100,
            sha256: None,
        })
    }

    async fn download(&self, _info: &MediaInfo) -> ChatResult<Vec<u8>> {
        Ok(vec![1u8; 100])
    }

    async fn upload(&self, _data: Vec<u8>, _mime_type: &str) -> ChatResult<UploadedMedia> {
        Ok(UploadedMedia::from_reference("stub-upload"))
    }

    async fn send(
        &self,
        conversation: &ConversationRef,
        message: &OutboundMessage,
    ) -> ChatResult<String> {
        self.sent
            .lock()
            .unwrap()
            .push((conversation.clone(), message.clone()));
        Ok("wamid.stub".to_string())
    }
}

pub struct TestState {
    pub app: AppState,
    pub queue: Arc<MemoryQueue>,
    pub chat: Arc<StubChat>,
    pub convert_queue: String,
    pub _dir: TempDir,
}

pub async fn test_state() -> TestState {
    let dir = TempDir::new().unwrap();
    let queues = QueueNames::default();
    let convert_queue = queues.convert.clone();
    let queue = Arc::new(MemoryQueue::default());
    let chat = Arc::new(StubChat::default());

    let mut worker_config = WorkerConfig::default();
    worker_config.conversion.work_dir = dir.path().join("work");

    let ctx = PipelineContext::new(
        &worker_config,
        queues,
        queue.clone(),
        Arc::new(LocalStaging::new(dir.path().join("staging"))),
        chat.clone(),
        Arc::new(FfmpegCodec::new(5)),
        MetadataWriter::new(&StickerPackMetadata::default()).unwrap(),
    );
    ctx.declare_queues().await.unwrap();

    let config = GatewayConfig {
        verify_token: Some("secret".to_string()),
        ..GatewayConfig::default()
    };

    TestState {
        app: AppState::new(config, IntakeValidator::new(ctx)),
        queue,
        chat,
        convert_queue,
        _dir: dir,
    }
}
