//! Elevation gate: extra verification for sensitive commands.
//!
//! At most one elevation provider is active; if a command is listed in a
//! plugin's elevated sets and no provider is registered, the gate fails
//! closed.

use std::sync::Arc;

use {async_trait::async_trait, clatter_plugins::PluginSpec, tracing::{error, warn}};

use crate::respond::Responder;

/// The single pluggable elevation provider.
///
/// `immediate` distinguishes always-re-challenge commands from ones where
/// the provider may honor a cached recent elevation.
#[async_trait]
pub trait Elevator: Send + Sync {
    async fn elevate(&self, user: &str, channel: Option<&str>, immediate: bool) -> bool;
}

/// Gate a matched command through the elevation provider. Commands outside
/// the plugin's elevated sets pass untouched.
pub(crate) async fn check_elevation(
    responder: &Responder,
    elevator: Option<&Arc<dyn Elevator>>,
    plugin: &PluginSpec,
    command: &str,
) -> bool {
    let Some(immediate) = plugin.elevation_for(command) else {
        return true;
    };
    let Some(elevator) = elevator else {
        error!(
            plugin = %plugin.name,
            command,
            "elevated command encountered with no elevation provider configured"
        );
        responder
            .say(&format!(
                "Sorry, the \"{command}\" command requires elevated privileges"
            ))
            .await;
        return false;
    };
    if elevator
        .elevate(responder.user(), responder.channel(), immediate)
        .await
    {
        true
    } else {
        warn!(
            plugin = %plugin.name,
            command,
            user = %responder.user(),
            immediate,
            "elevation denied"
        );
        responder
            .say(&format!(
                "Sorry, the \"{command}\" command requires elevated privileges"
            ))
            .await;
        false
    }
}
