//! Which inbound messages become stickerize requests.

use std::collections::{HashMap, VecDeque};

use sticker_chat::InboundMessage;
use sticker_models::{ConversationRef, MediaRef, TaskId};
use sticker_worker::IntakeRequest;

use crate::config::GatewayConfig;

/// Why a message was not turned into a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    /// Sender is not on the allow-list
    Sender,
    /// Nothing asked for a sticker
    NoCommand,
    /// A reply asked for a sticker but the quoted media is unknown
    QuotedMediaUnknown,
}

impl Skip {
    pub fn as_str(&self) -> &'static str {
        match self {
            Skip::Sender => "sender",
            Skip::NoCommand => "no_command",
            Skip::QuotedMediaUnknown => "quoted_unknown",
        }
    }
}

/// Media messages seen recently, so a later reply can quote them.
///
/// The platform only sends the quoted message id with a reply, never the
/// quoted media itself. Oldest entries are evicted first.
#[derive(Debug)]
pub struct RecentMedia {
    capacity: usize,
    order: VecDeque<String>,
    media: HashMap<String, MediaRef>,
}

impl RecentMedia {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            media: HashMap::new(),
        }
    }

    pub fn remember(&mut self, message_id: &str, media: MediaRef) {
        if self.media.insert(message_id.to_string(), media).is_none() {
            self.order.push_back(message_id.to_string());
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.media.remove(&oldest);
            }
        }
    }

    pub fn get(&self, message_id: &str) -> Option<&MediaRef> {
        self.media.get(message_id)
    }

    pub fn len(&self) -> usize {
        self.media.len()
    }

    pub fn is_empty(&self) -> bool {
        self.media.is_empty()
    }
}

/// Command matching and the sender allow-list.
#[derive(Debug, Clone)]
pub struct TriggerFilter {
    commands: Vec<String>,
    allowed_sender: Option<String>,
}

impl TriggerFilter {
    pub fn new(commands: Vec<String>, allowed_sender: Option<String>) -> Self {
        Self {
            commands: commands.into_iter().map(|c| c.trim().to_lowercase()).collect(),
            allowed_sender,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.trigger_commands.clone(), config.allowed_sender.clone())
    }

    /// Whether `text` is one of the commands, ignoring case and surrounding
    /// whitespace.
    pub fn is_command(&self, text: &str) -> bool {
        let text = text.trim().to_lowercase();
        self.commands.iter().any(|c| *c == text)
    }

    /// Pick the media to stickerize for `message`, if any.
    ///
    /// Captioned media with a command is taken in any conversation. Image and
    /// video sent in a direct conversation are taken without a caption. A
    /// reply whose text is a command takes the quoted media instead.
    pub fn select(&self, message: &InboundMessage, recent: &RecentMedia) -> Result<MediaRef, Skip> {
        if let Some(allowed) = &self.allowed_sender {
            if message.from != *allowed {
                return Err(Skip::Sender);
            }
        }

        if let Some(media) = message.media() {
            let captioned = message.caption().is_some_and(|c| self.is_command(c));
            let direct_media = !message.is_group() && media.media_kind().is_some();
            if captioned || direct_media {
                return Ok(media);
            }
            return Err(Skip::NoCommand);
        }

        match (message.text_body(), message.quoted_id()) {
            (Some(text), Some(quoted)) if self.is_command(text) => recent
                .get(quoted)
                .filter(|media| media.media_kind().is_some())
                .cloned()
                .ok_or(Skip::QuotedMediaUnknown),
            _ => Err(Skip::NoCommand),
        }
    }
}

/// Build the intake request for `message` stickerizing `media`.
pub fn intake_request(message: &InboundMessage, media: MediaRef) -> IntakeRequest {
    IntakeRequest {
        task_id: TaskId::from_string(&message.id),
        media,
        conversation_ref: ConversationRef::new(message.conversation().as_bytes().to_vec()),
        is_group_conversation: message.is_group(),
        sender_id: message.from.clone(),
        requested_at: message.requested_at(),
        message_id: Some(message.id.clone()),
    }
}
