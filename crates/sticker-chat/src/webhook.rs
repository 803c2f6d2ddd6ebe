//! Inbound webhook payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sticker_models::MediaRef;

/// Top-level webhook notification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messaging_product: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub messages: Vec<InboundMessage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub display_phone_number: String,
    #[serde(default)]
    pub phone_number_id: String,
}

/// Media attached to an inbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPayload {
    pub id: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPayload {
    pub body: String,
}

/// The message being replied to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContext {
    #[serde(default)]
    pub from: Option<String>,
    pub id: String,
}

/// One inbound chat message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub from: String,
    pub id: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextPayload>,
    #[serde(default)]
    pub image: Option<MediaPayload>,
    #[serde(default)]
    pub video: Option<MediaPayload>,
    #[serde(default)]
    pub sticker: Option<MediaPayload>,
    #[serde(default)]
    pub document: Option<MediaPayload>,
    #[serde(default)]
    pub audio: Option<MediaPayload>,
    #[serde(default)]
    pub context: Option<MessageContext>,
    /// Set by platforms that deliver group traffic
    #[serde(default)]
    pub group_id: Option<String>,
}

impl WebhookPayload {
    /// Every message in the notification with its receiving phone number id.
    pub fn messages(&self) -> impl Iterator<Item = (&str, &InboundMessage)> {
        self.entry.iter().flat_map(|entry| {
            entry.changes.iter().flat_map(|change| {
                let phone = change.value.metadata.phone_number_id.as_str();
                change.value.messages.iter().map(move |m| (phone, m))
            })
        })
    }
}

impl InboundMessage {
    fn media_payload(&self) -> Option<&MediaPayload> {
        match self.kind.as_str() {
            "image" => self.image.as_ref(),
            "video" | "gif" => self.video.as_ref(),
            "sticker" => self.sticker.as_ref(),
            "document" => self.document.as_ref(),
            "audio" => self.audio.as_ref(),
            _ => None,
        }
    }

    /// Attached media, supported or not.
    pub fn media(&self) -> Option<MediaRef> {
        self.media_payload().map(|payload| MediaRef {
            media_id: payload.id.clone(),
            platform_type: self.kind.clone(),
            mime_type: payload.mime_type.clone(),
            declared_byte_length: payload.file_size,
            declared_duration_seconds: None,
        })
    }

    /// Caption of attached media.
    pub fn caption(&self) -> Option<&str> {
        self.media_payload().and_then(|p| p.caption.as_deref())
    }

    /// Body of a text message.
    pub fn text_body(&self) -> Option<&str> {
        self.text.as_ref().map(|t| t.body.as_str())
    }

    /// Id of the quoted message, when this is a reply.
    pub fn quoted_id(&self) -> Option<&str> {
        self.context.as_ref().map(|c| c.id.as_str())
    }

    pub fn is_group(&self) -> bool {
        self.group_id.is_some()
    }

    /// Conversation to reply into: the group when there is one, else the sender.
    pub fn conversation(&self) -> &str {
        self.group_id.as_deref().unwrap_or(&self.from)
    }

    /// Request time as RFC 3339, falling back to now for bad timestamps.
    pub fn requested_at(&self) -> String {
        self.timestamp
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now)
            .to_rfc3339()
    }
}
