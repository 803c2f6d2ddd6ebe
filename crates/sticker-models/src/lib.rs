//! Shared data models for the sticker pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Media kinds and the per-kind size/duration ceilings
//! - Queue payloads flowing between stages (conversion, delivery, telemetry)
//! - Opaque conversation references passed through the pipeline untouched

pub mod media;
pub mod task;
pub mod telemetry;

// Re-export common types
pub use media::{
    extension_for_mime, ImageRules, MediaKind, MediaRef, MediaRules, RuleViolation, RulesError, VideoRules,
    DEFAULT_IMAGE_MAX_BYTES, DEFAULT_VIDEO_MAX_BYTES, DEFAULT_VIDEO_MAX_SECONDS, WEBP_EXTENSION,
};
pub use task::{ConversationRef, ConversionState, ConversionTask, DeliveryTask, TaskId};
pub use telemetry::TelemetryEvent;
