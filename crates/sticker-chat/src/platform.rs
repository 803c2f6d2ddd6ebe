//! The chat platform seam.

use async_trait::async_trait;
use sticker_models::{ConversationRef, MediaRef};

use crate::error::ChatResult;
use crate::types::{MediaInfo, OutboundMessage, UploadedMedia};

/// Chat platform session. No call is retried at this layer.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Look up platform metadata (size, download URL) of a media object.
    async fn media_info(&self, media: &MediaRef) -> ChatResult<MediaInfo>;

    /// Download the media bytes.
    async fn download(&self, info: &MediaInfo) -> ChatResult<Vec<u8>>;

    /// Upload an artifact for use in a message.
    async fn upload(&self, data: Vec<u8>, mime_type: &str) -> ChatResult<UploadedMedia>;

    /// Send a message into a conversation, returning the platform message id.
    async fn send(
        &self,
        conversation: &ConversationRef,
        message: &OutboundMessage,
    ) -> ChatResult<String>;
}
