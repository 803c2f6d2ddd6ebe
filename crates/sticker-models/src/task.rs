//! Queue payloads exchanged between pipeline stages.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

use crate::media::MediaKind;

/// Unique identifier for a task.
///
/// Usually the originating platform message id, which keeps staged file
/// names unique across concurrent tasks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Generate a new random task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque bytes identifying the conversation to reply to.
///
/// Created at intake and forwarded unchanged by every later stage. Serialized
/// as standard base64 so the payload stays valid JSON.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ConversationRef(Vec<u8>);

impl ConversationRef {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for ConversationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConversationRef({} bytes)", self.0.len())
    }
}

impl Serialize for ConversationRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for ConversationRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

/// Conversion state of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversionState {
    /// Task received, nothing encoded yet
    #[default]
    Pending,
    /// Codec invocation in progress
    Encoding,
    /// Artifact fits the ceiling
    Satisfied,
    /// Quality ladder ran out without fitting the ceiling
    Exhausted,
    /// Codec or staging failure
    Failed,
}

impl ConversionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionState::Pending => "pending",
            ConversionState::Encoding => "encoding",
            ConversionState::Satisfied => "satisfied",
            ConversionState::Exhausted => "exhausted",
            ConversionState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConversionState::Satisfied | ConversionState::Exhausted | ConversionState::Failed
        )
    }

    /// Whether `next` may follow this state.
    ///
    /// A task fails straight from `Pending` when its input cannot be read;
    /// only `Encoding` reaches a size verdict.
    pub fn can_advance_to(&self, next: ConversionState) -> bool {
        match self {
            ConversionState::Pending => {
                matches!(next, ConversionState::Encoding | ConversionState::Failed)
            }
            ConversionState::Encoding => next.is_terminal(),
            _ => false,
        }
    }
}

/// Payload of the conversion queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConversionTask {
    /// Task ID (originating message id)
    pub task_id: TaskId,
    /// Staging key of the raw media
    pub media_path: String,
    /// Staging key the artifact is written to
    pub output_path: String,
    /// Byte length of the source media
    pub source_byte_length: u64,
    pub media_kind: MediaKind,
    #[schemars(with = "String")]
    pub conversation_ref: ConversationRef,
    pub is_group_conversation: bool,
    pub sender_id: String,
    pub requested_at: String,
    /// Message to quote in replies, when reply-to is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

/// Payload of the delivery queue: a converted task whose artifact exists and
/// satisfies the media rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DeliveryTask {
    #[serde(flatten)]
    pub task: ConversionTask,
    /// True for video/gif-derived artifacts
    pub animated: bool,
    /// Artifact size measured after conversion
    pub artifact_byte_length: u64,
}

impl DeliveryTask {
    /// Build the delivery payload for a satisfied conversion.
    pub fn from_conversion(task: ConversionTask, artifact_byte_length: u64) -> Self {
        let animated = task.media_kind.is_animated();
        Self {
            task,
            animated,
            artifact_byte_length,
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task.task_id
    }
}
