//! Terminal connector: stdin lines in, stdout messages out.
//!
//! Line protocol for inbound traffic:
//! - `#channel user: text` — channel message; directed when `text` opens
//!   with the bot's name (`botname,` or `botname:`), which is stripped.
//! - `user: text` — direct message, always directed.

use {async_trait::async_trait, clatter_common::{Connector, InboundMessage}};

pub struct TerminalConnector;

#[async_trait]
impl Connector for TerminalConnector {
    async fn send_channel(&self, channel: &str, text: &str) -> anyhow::Result<()> {
        println!("#{channel} | {text}");
        Ok(())
    }

    async fn send_direct(&self, user: &str, text: &str) -> anyhow::Result<()> {
        println!("(dm -> {user}) | {text}");
        Ok(())
    }
}

/// Parse one stdin line into an inbound message. Returns `None` for lines
/// that don't follow the protocol.
pub fn parse_line(bot_name: &str, line: &str) -> Option<InboundMessage> {
    let line = line.trim_end();
    let (channel, rest) = if let Some(rest) = line.strip_prefix('#') {
        let (channel, rest) = rest.split_once(' ')?;
        (Some(channel.to_string()), rest)
    } else {
        (None, line)
    };
    let (user, text) = rest.split_once(": ").or_else(|| {
        // Allow an empty message: "alice:".
        rest.strip_suffix(':').map(|user| (user, ""))
    })?;
    if user.is_empty() {
        return None;
    }

    match &channel {
        None => Some(InboundMessage::directed(user, None, text)),
        Some(_) => match strip_address(bot_name, text) {
            Some(stripped) => Some(InboundMessage {
                directed: true,
                channel,
                user: user.to_string(),
                text: stripped.to_string(),
            }),
            None => Some(InboundMessage {
                directed: false,
                channel,
                user: user.to_string(),
                text: text.to_string(),
            }),
        },
    }
}

/// If `text` addresses the bot by name, return the remainder.
fn strip_address<'a>(bot_name: &str, text: &'a str) -> Option<&'a str> {
    for sep in [",", ":"] {
        if let Some(rest) = text.strip_prefix(&format!("{bot_name}{sep}")) {
            return Some(rest.trim_start());
        }
    }
    if text == bot_name {
        return Some("");
    }
    None
}
