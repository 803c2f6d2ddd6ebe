//! WhatsApp Cloud API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use sticker_models::{ConversationRef, MediaRef};
use tracing::{debug, info};

use crate::error::{ChatError, ChatResult};
use crate::platform::ChatPlatform;
use crate::types::{MediaInfo, OutboundMessage, UploadedMedia};

const MESSAGING_PRODUCT: &str = "whatsapp";

/// Cloud API configuration.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Graph API base URL including version
    pub base_url: String,
    /// Bearer token
    pub access_token: String,
    /// Sending phone number id
    pub phone_number_id: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ChatConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ChatResult<Self> {
        Ok(Self {
            base_url: std::env::var("WHATSAPP_API_BASE")
                .unwrap_or_else(|_| "https://graph.facebook.com/v19.0".to_string()),
            access_token: std::env::var("WHATSAPP_TOKEN")
                .map_err(|_| ChatError::config("WHATSAPP_TOKEN not set"))?,
            phone_number_id: std::env::var("WHATSAPP_PHONE_NUMBER_ID")
                .map_err(|_| ChatError::config("WHATSAPP_PHONE_NUMBER_ID not set"))?,
            timeout: Duration::from_secs(
                std::env::var("CHAT_HTTP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        })
    }
}

#[derive(Debug, Deserialize)]
struct MediaUrlResponse {
    id: Option<String>,
    url: String,
    mime_type: Option<String>,
    file_size: u64,
    sha256: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

/// Cloud API client.
#[derive(Clone)]
pub struct CloudApiClient {
    http: Client,
    config: ChatConfig,
}

impl CloudApiClient {
    pub fn new(config: ChatConfig) -> ChatResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("sticker-chat/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> ChatResult<Self> {
        Self::new(ChatConfig::from_env()?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Recipient id carried by a conversation reference.
    fn recipient(conversation: &ConversationRef) -> ChatResult<&str> {
        let to = std::str::from_utf8(conversation.as_bytes())
            .map_err(|e| ChatError::InvalidConversation(e.to_string()))?;
        if to.is_empty() {
            return Err(ChatError::InvalidConversation("empty recipient".to_string()));
        }
        Ok(to)
    }

    /// Request body for a message.
    fn message_body(to: &str, message: &OutboundMessage) -> Value {
        let mut body = match message {
            OutboundMessage::Text { body, .. } => json!({
                "messaging_product": MESSAGING_PRODUCT,
                "recipient_type": "individual",
                "to": to,
                "type": "text",
                "text": { "body": body },
            }),
            OutboundMessage::Sticker { sticker, .. } => json!({
                "messaging_product": MESSAGING_PRODUCT,
                "recipient_type": "individual",
                "to": to,
                "type": "sticker",
                "sticker": { "id": sticker.media.reference },
            }),
        };
        if let Some(message_id) = message.reply_to() {
            body["context"] = json!({ "message_id": message_id });
        }
        body
    }

    async fn check(response: Response) -> ChatResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ChatError::from_status(status.as_u16(), body))
    }
}

#[async_trait]
impl ChatPlatform for CloudApiClient {
    async fn media_info(&self, media: &MediaRef) -> ChatResult<MediaInfo> {
        let response = self
            .http
            .get(self.url(&media.media_id))
            .bearer_auth(&self.config.access_token)
            .send()
            .await?;
        let meta: MediaUrlResponse = Self::check(response).await?.json().await?;

        debug!(media_id = %media.media_id, bytes = meta.file_size, "Fetched media info");
        Ok(MediaInfo {
            media_id: meta.id.unwrap_or_else(|| media.media_id.clone()),
            url: meta.url,
            mime_type: meta.mime_type.or_else(|| media.mime_type.clone()),
            byte_length: meta.file_size,
            sha256: meta.sha256,
        })
    }

    async fn download(&self, info: &MediaInfo) -> ChatResult<Vec<u8>> {
        let response = self
            .http
            .get(&info.url)
            .bearer_auth(&self.config.access_token)
            .send()
            .await?;
        let bytes = Self::check(response).await?.bytes().await?;

        debug!(media_id = %info.media_id, bytes = bytes.len(), "Downloaded media");
        Ok(bytes.to_vec())
    }

    async fn upload(&self, data: Vec<u8>, mime_type: &str) -> ChatResult<UploadedMedia> {
        let len = data.len();
        let file = Part::bytes(data)
            .file_name("sticker.webp")
            .mime_str(mime_type)?;
        let form = Form::new()
            .part("file", file)
            .text("type", mime_type.to_string())
            .text("messaging_product", MESSAGING_PRODUCT);

        let response = self
            .http
            .post(self.url(&format!("{}/media", self.config.phone_number_id)))
            .bearer_auth(&self.config.access_token)
            .multipart(form)
            .send()
            .await?;
        let uploaded: UploadResponse = Self::check(response).await?.json().await?;

        info!(media_id = %uploaded.id, bytes = len, "Uploaded media");
        Ok(UploadedMedia::from_reference(uploaded.id))
    }

    async fn send(
        &self,
        conversation: &ConversationRef,
        message: &OutboundMessage,
    ) -> ChatResult<String> {
        let to = Self::recipient(conversation)?;
        let body = Self::message_body(to, message);

        let response = self
            .http
            .post(self.url(&format!("{}/messages", self.config.phone_number_id)))
            .bearer_auth(&self.config.access_token)
            .json(&body)
            .send()
            .await?;
        let sent: SendResponse = Self::check(response).await?.json().await?;

        let id = sent
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| ChatError::UnexpectedResponse("no message id returned".to_string()))?;
        debug!(kind = message.kind(), message_id = %id, "Sent message");
        Ok(id)
    }
}
