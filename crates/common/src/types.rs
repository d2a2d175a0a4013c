//! Inbound message shape, plugin result codes, and the connector boundary.

use serde::{Deserialize, Serialize};

/// A normalized inbound chat message as delivered by a connector.
///
/// `channel: None` means a direct message. `directed` is set by the
/// connector when the message was explicitly addressed to the bot
/// (direct messages are always directed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub directed: bool,
    pub channel: Option<String>,
    pub user: String,
    pub text: String,
}

impl InboundMessage {
    /// A message addressed to the bot, either in a channel or as a DM.
    pub fn directed(user: impl Into<String>, channel: Option<String>, text: impl Into<String>) -> Self {
        Self {
            directed: true,
            channel,
            user: user.into(),
            text: text.into(),
        }
    }

    /// Ambient channel traffic not addressed to the bot.
    pub fn ambient(user: impl Into<String>, channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            directed: false,
            channel: Some(channel.into()),
            user: user.into(),
            text: text.into(),
        }
    }
}

/// Result codes a plugin invocation can produce.
///
/// `Ok` is the mechanical "call completed" code used by infrastructure
/// commands; `Success`/`Fail` carry the plugin's own verdict (authorizers
/// approve with `Success` and deny with `Fail`). Anything else is treated
/// as a mechanism failure by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PluginRetVal {
    Ok,
    Success,
    Fail,
    GeneralError,
    TechnicalProblem,
}

/// Outbound side of a chat connector.
///
/// The dispatcher and plugin bodies only ever produce text aimed at a
/// channel or a user; formatting and transport are the connector's concern.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Post a message to a channel.
    async fn send_channel(&self, channel: &str, text: &str) -> anyhow::Result<()>;

    /// Send a direct message to a user.
    async fn send_direct(&self, user: &str, text: &str) -> anyhow::Result<()>;
}
