use async_trait::async_trait;
use thiserror::Error;

use super::models::ChannelConfig;

pub mod ntfy;
pub mod smsbox;

#[derive(Error, Debug)]
pub enum SenderError {
    #[error("failed to send notification: {0}")]
    SendFailed(String),
    #[error("invalid configuration for sender: {0}")]
    InvalidConfiguration(String),
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// A trait for sending notifications to a specific backend.
/// All concrete sender implementations must implement this trait.
#[async_trait]
pub trait NotificationSender {
    /// Sends one already-composed message.
    async fn send(&self, config: &ChannelConfig, message: &str) -> Result<(), SenderError>;
}
