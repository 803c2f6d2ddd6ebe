//! Platform-neutral message and media types.

use serde::{Deserialize, Serialize};

/// Platform metadata of a media object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub media_id: String,
    /// Short-lived download URL
    pub url: String,
    pub mime_type: Option<String>,
    pub byte_length: u64,
    pub sha256: Option<String>,
}

/// Result of uploading an artifact. Fingerprints come from the platform and
/// are never recomputed locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedMedia {
    /// Opaque reference (media id or URL) used to send the media
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_enc_sha256: Option<String>,
}

impl UploadedMedia {
    pub fn from_reference(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            direct_path: None,
            media_key: None,
            file_sha256: None,
            file_enc_sha256: None,
        }
    }
}

/// Sticker message built from an upload result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StickerMessage {
    pub media: UploadedMedia,
    pub mime_type: String,
    pub file_length: u64,
    pub animated: bool,
}

/// Message sent into a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundMessage {
    Text {
        body: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reply_to: Option<String>,
    },
    Sticker {
        sticker: StickerMessage,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reply_to: Option<String>,
    },
}

impl OutboundMessage {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text {
            body: body.into(),
            reply_to: None,
        }
    }

    pub fn sticker(sticker: StickerMessage) -> Self {
        Self::Sticker {
            sticker,
            reply_to: None,
        }
    }

    /// Quote `message_id` in the reply.
    pub fn replying_to(mut self, message_id: Option<String>) -> Self {
        match &mut self {
            Self::Text { reply_to, .. } | Self::Sticker { reply_to, .. } => *reply_to = message_id,
        }
        self
    }

    pub fn reply_to(&self) -> Option<&str> {
        match self {
            Self::Text { reply_to, .. } | Self::Sticker { reply_to, .. } => reply_to.as_deref(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Sticker { .. } => "sticker",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replying_to_sets_context() {
        let msg = OutboundMessage::text("hi").replying_to(Some("wamid.1".to_string()));
        assert_eq!(msg.reply_to(), Some("wamid.1"));
        assert_eq!(msg.kind(), "text");

        let msg = msg.replying_to(None);
        assert_eq!(msg.reply_to(), None);
    }
}
