//! Chat platform collaborator.
//!
//! This crate provides:
//! - The [`ChatPlatform`] seam (media lookup, download, upload, send)
//! - Platform-neutral outbound message types
//! - A WhatsApp Cloud API client
//! - The inbound webhook payload model

pub mod cloud_api;
pub mod error;
pub mod platform;
pub mod types;
pub mod webhook;

pub use cloud_api::{ChatConfig, CloudApiClient};
pub use error::{ChatError, ChatResult};
pub use platform::ChatPlatform;
pub use types::{MediaInfo, OutboundMessage, StickerMessage, UploadedMedia};
pub use webhook::{InboundMessage, MediaPayload, WebhookPayload};
