//! The plugin execution boundary.
//!
//! The dispatcher never looks inside a plugin body; it hands a fully gated
//! [`Invocation`] to whatever [`PluginRunner`] the host wired in and
//! interprets the returned result code.

use std::sync::Arc;

use {async_trait::async_trait, clatter_common::PluginRetVal};

use crate::plugin::PluginSpec;

/// Everything a runner needs to execute one plugin command.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub user: String,
    pub channel: Option<String>,
    pub plugin: Arc<PluginSpec>,
    pub command: String,
    pub args: Vec<String>,
    /// Surface failures to the user rather than only the log.
    pub visible_errors: bool,
    /// Whether this invocation runs as an independent background task
    /// (ordinary commands) or inline (authorizers).
    pub background: bool,
}

/// Executes plugin bodies. Implementations must catch their own internal
/// failures and express them through the result code; a runner that
/// panics aborts only its own spawned task.
#[async_trait]
pub trait PluginRunner: Send + Sync {
    async fn run(&self, invocation: Invocation) -> PluginRetVal;
}
