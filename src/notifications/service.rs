//! Dispatch of composed messages to the configured backend.
//!
//! Backend failures are contained here: a failed send is logged and never
//! propagated to the orchestrator, and nothing is retried within a run.

use reqwest::Client;
use tracing::{error, info};

use super::models::ChannelConfig;
use super::senders::{ntfy::NtfySender, smsbox::SmsboxSender, NotificationSender};

/// Sends messages to the single backend selected by configuration.
pub struct NotificationService {
    channel: ChannelConfig,
    http: Client,
}

impl NotificationService {
    pub fn new(channel: ChannelConfig, http: Client) -> Self {
        Self { channel, http }
    }

    /// Best-effort dispatch of one message.
    pub async fn dispatch(&self, message: &str) {
        let sender: Box<dyn NotificationSender + Send + Sync> = match &self.channel {
            ChannelConfig::Ntfy { .. } => Box::new(NtfySender::new(self.http.clone())),
            ChannelConfig::Smsbox { .. } => Box::new(SmsboxSender::new(self.http.clone())),
        };
        match sender.send(&self.channel, message).await {
            Ok(()) => info!("notification sent"),
            Err(e) => error!(error = %e, "failed to send notification"),
        }
    }
}

/// Builds the aggregated "newly down" message.
pub fn down_message(descriptions: &[String], timestamp: &str) -> String {
    format!(
        "Monitoring failure on {} at {timestamp}",
        descriptions.join(", ")
    )
}

/// Builds the aggregated "back up" message.
pub fn up_message(descriptions: &[String], timestamp: &str) -> String {
    format!("{} back up since {timestamp}", descriptions.join(", "))
}
