//! Channel Trait Definitions
//!
//! Outbound interface to the chat transport.

use async_trait::async_trait;
use std::fmt;

/// Error types for channel operations
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u64),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
}

/// Parse mode for message formatting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseMode {
    #[default]
    Plain,
    /// Simple emphasis markup (`*bold*`, `_italic_`)
    Markdown,
}

/// Reference to a message sent through a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i32,
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chat_id, self.message_id)
    }
}

/// Notifier trait - outbound replies to a chat
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a text message
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: ParseMode,
    ) -> Result<MessageRef, ChannelError>;

    /// Delete a previously sent message
    async fn delete_message(&self, message: MessageRef) -> Result<(), ChannelError>;
}

/// Delete a message, ignoring failures
pub async fn delete_quietly(notifier: &dyn Notifier, message: MessageRef) {
    if let Err(e) = notifier.delete_message(message).await {
        tracing::debug!("Ignoring failed delete of {}: {}", message, e);
    }
}
