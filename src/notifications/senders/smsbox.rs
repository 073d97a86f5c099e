use async_trait::async_trait;
use reqwest::Client;

use super::{NotificationSender, SenderError};
use crate::notifications::models::ChannelConfig;

const API_URL: &str = "https://api.smsbox.pro/1.1/api.php";

/// A sender pushing messages through the SMSBox gateway.
///
/// Messages go out in `expert` mode with the premium routing strategy; the
/// gateway answers 200 even on rejection, so the body is what decides.
pub struct SmsboxSender {
    client: Client,
    api_url: String,
}

impl SmsboxSender {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            api_url: API_URL.to_string(),
        }
    }

    /// Points the sender at a different gateway endpoint.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

#[async_trait]
impl NotificationSender for SmsboxSender {
    async fn send(&self, config: &ChannelConfig, message: &str) -> Result<(), SenderError> {
        let (api_key, recipient) = match config {
            ChannelConfig::Smsbox { api_key, recipient } => (api_key, recipient),
            _ => {
                return Err(SenderError::InvalidConfiguration(
                    "expected smsbox config, but found a different type".to_string(),
                ));
            }
        };

        let params = [
            ("dest", recipient.as_str()),
            ("msg", message),
            ("mode", "expert"),
            ("strategy", "2"),
            ("id", "1"),
        ];

        let response = self
            .client
            .post(&self.api_url)
            .header("authorization", format!("App {api_key}"))
            .form(&params)
            .send()
            .await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "failed to read response body".to_string());

        if !status.is_success() {
            return Err(SenderError::SendFailed(format!(
                "SMSBox gateway returned non-success status: {status}. Body: {body}"
            )));
        }
        if !body.trim_start().starts_with("OK") {
            return Err(SenderError::SendFailed(format!(
                "SMSBox gateway rejected the message: {body}"
            )));
        }

        Ok(())
    }
}
