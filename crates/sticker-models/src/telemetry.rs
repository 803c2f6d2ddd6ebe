//! Telemetry payload published on every terminal task outcome.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::media::MediaKind;
use crate::task::ConversionTask;

/// Outcome record consumed by the telemetry aggregator.
///
/// The feed is lossy: a dropped event skews counters but never affects the
/// pipeline. `sender_id` is only used to derive a locale dimension and is
/// never stored raw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TelemetryEvent {
    pub initial_byte_length: u64,
    pub final_byte_length: u64,
    /// `None` for media the pipeline does not support
    pub media_kind: Option<MediaKind>,
    pub is_group_conversation: bool,
    pub sender_id: String,
    pub requested_at: String,
    /// True only when the sticker reached the conversation
    pub validated: bool,
}

impl TelemetryEvent {
    /// Failed outcome for a task that entered the pipeline.
    pub fn failed(task: &ConversionTask) -> Self {
        Self {
            initial_byte_length: task.source_byte_length,
            final_byte_length: 0,
            media_kind: Some(task.media_kind),
            is_group_conversation: task.is_group_conversation,
            sender_id: task.sender_id.clone(),
            requested_at: task.requested_at.clone(),
            validated: false,
        }
    }

    /// Successful delivery of an artifact of `final_byte_length` bytes.
    pub fn delivered(task: &ConversionTask, final_byte_length: u64) -> Self {
        Self {
            final_byte_length,
            validated: true,
            ..Self::failed(task)
        }
    }

    /// Rejection before any task was created.
    pub fn rejected(
        media_kind: Option<MediaKind>,
        initial_byte_length: u64,
        is_group_conversation: bool,
        sender_id: impl Into<String>,
        requested_at: impl Into<String>,
    ) -> Self {
        Self {
            initial_byte_length,
            final_byte_length: 0,
            media_kind,
            is_group_conversation,
            sender_id: sender_id.into(),
            requested_at: requested_at.into(),
            validated: false,
        }
    }

    /// Label value for the media kind dimension.
    pub fn media_label(&self) -> &'static str {
        self.media_kind.map(|k| k.as_str()).unwrap_or("unknown")
    }

    /// Label value for the conversation dimension.
    pub fn conversation_label(&self) -> &'static str {
        if self.is_group_conversation {
            "group"
        } else {
            "direct"
        }
    }

    /// Label value for the outcome dimension.
    pub fn outcome_label(&self) -> &'static str {
        if self.validated {
            "valid"
        } else {
            "invalid"
        }
    }
}
