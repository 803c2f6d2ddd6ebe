//! Pipeline error types.

use sticker_models::RuleViolation;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Size or duration ceiling violated. User-visible, not an operational error.
    #[error("Validation rejected: {0}")]
    ValidationRejected(RuleViolation),

    #[error("Transient I/O failure: {0}")]
    TransientIo(String),

    #[error("Codec failure: {0}")]
    Codec(String),

    /// Payload could not be decoded. Handed back to the broker.
    #[error("Malformed task: {0}")]
    MalformedTask(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Queue error: {0}")]
    Queue(#[from] sticker_queue::QueueError),

    #[error("Storage error: {0}")]
    Storage(#[from] sticker_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] sticker_media::MediaError),

    #[error("Chat error: {0}")]
    Chat(#[from] sticker_chat::ChatError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn transient_io(msg: impl Into<String>) -> Self {
        Self::TransientIo(msg.into())
    }

    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedTask(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the delivery must be rejected back to the broker instead of
    /// acknowledged.
    pub fn is_malformed(&self) -> bool {
        matches!(self, PipelineError::MalformedTask(_))
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::TransientIo(_)
            | PipelineError::Queue(_)
            | PipelineError::Storage(_)
            | PipelineError::Io(_) => true,
            PipelineError::Chat(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Whether the codec rejected the input.
    pub fn is_codec_failure(&self) -> bool {
        match self {
            PipelineError::Codec(_) => true,
            PipelineError::Media(e) => e.is_codec_failure(),
            _ => false,
        }
    }
}
