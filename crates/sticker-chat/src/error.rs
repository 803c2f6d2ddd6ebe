//! Chat platform error types.

use thiserror::Error;

pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Invalid conversation reference: {0}")]
    InvalidConversation(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ChatError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    /// Whether a later attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ChatError::Network(_) => true,
            ChatError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        assert!(ChatError::from_status(503, "busy").is_retryable());
        assert!(ChatError::from_status(429, "slow down").is_retryable());
        assert!(!ChatError::from_status(400, "bad").is_retryable());
        assert!(!ChatError::InvalidConversation("x".into()).is_retryable());
    }
}
