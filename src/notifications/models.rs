use serde::{Deserialize, Serialize};

/// Configuration of the selected notification backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChannelConfig {
    /// ntfy push service: a server URL and the topic to publish on.
    Ntfy { server: String, topic: String },
    /// SMSBox gateway: an API key and the recipient number.
    Smsbox { api_key: String, recipient: String },
}
