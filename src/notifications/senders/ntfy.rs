use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{NotificationSender, SenderError};
use crate::notifications::models::ChannelConfig;

const DEFAULT_TITLE: &str = "IP Monitor";
const DEFAULT_PRIORITY: u8 = 4;

/// A sender publishing messages to an ntfy server.
pub struct NtfySender {
    client: Client,
}

impl NtfySender {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[derive(Serialize)]
struct NtfyMessage<'a> {
    topic: &'a str,
    title: &'a str,
    message: &'a str,
    priority: u8,
}

#[async_trait]
impl NotificationSender for NtfySender {
    async fn send(&self, config: &ChannelConfig, message: &str) -> Result<(), SenderError> {
        let (server, topic) = match config {
            ChannelConfig::Ntfy { server, topic } => (server, topic),
            _ => {
                return Err(SenderError::InvalidConfiguration(
                    "expected ntfy config, but found a different type".to_string(),
                ));
            }
        };

        let payload = NtfyMessage {
            topic,
            title: DEFAULT_TITLE,
            message,
            priority: DEFAULT_PRIORITY,
        };

        let response = self.client.post(server).json(&payload).send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "ntfy server returned non-success status: {status}. Body: {error_body}"
            )));
        }

        Ok(())
    }
}
