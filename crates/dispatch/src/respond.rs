//! Connector-backed responder bound to one (user, channel).

use std::sync::Arc;

use {clatter_common::Connector, tracing::warn};

/// Sends dispatcher output back where the message came from. Send failures
/// are the connector's problem; they are logged and never abort dispatch.
#[derive(Clone)]
pub struct Responder {
    connector: Arc<dyn Connector>,
    user: String,
    channel: Option<String>,
}

impl Responder {
    pub fn new(connector: Arc<dyn Connector>, user: &str, channel: Option<&str>) -> Self {
        Self {
            connector,
            user: user.to_string(),
            channel: channel.map(str::to_string),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    /// Reply in the originating channel, or by DM for a direct message.
    pub async fn say(&self, text: &str) {
        let result = match &self.channel {
            Some(channel) => self.connector.send_channel(channel, text).await,
            None => self.connector.send_direct(&self.user, text).await,
        };
        if let Err(error) = result {
            warn!(user = %self.user, channel = ?self.channel, %error, "failed to deliver reply");
        }
    }

    /// Always DM the user, regardless of where the message originated.
    pub async fn say_direct(&self, text: &str) {
        if let Err(error) = self.connector.send_direct(&self.user, text).await {
            warn!(user = %self.user, %error, "failed to deliver direct message");
        }
    }
}
