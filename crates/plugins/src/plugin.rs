//! The plugin descriptor and its input matchers.

use regex::Regex;

/// A single command or ambient pattern a plugin responds to.
///
/// `contexts` is positionally aligned with the pattern's capture groups;
/// an empty label means no pronoun substitution for that group.
#[derive(Debug, Clone)]
pub struct InputMatcher {
    pub command: String,
    pub pattern: Regex,
    pub contexts: Vec<String>,
}

/// Immutable description of one registered plugin: who may trigger it,
/// where, and on which patterns.
#[derive(Debug, Clone, Default)]
pub struct PluginSpec {
    pub name: String,

    // Where the plugin may be triggered.
    pub direct_only: bool,
    pub allow_direct: bool,
    pub require_admin: bool,
    /// Glob patterns; empty means any user.
    pub users: Vec<String>,
    /// Explicit channel list; ignored when `all_channels` is set.
    pub channels: Vec<String>,
    pub all_channels: bool,

    // What the plugin responds to.
    pub commands: Vec<InputMatcher>,
    pub ambient: Vec<InputMatcher>,
    pub catch_all: bool,

    // Authorization and elevation.
    pub authorizer: Option<String>,
    /// Opaque string handed to the authorizer as the required auth level.
    pub auth_require: String,
    pub elevated_commands: Vec<String>,
    pub elevate_immediate_commands: Vec<String>,

    // Trust configuration, consulted only when this plugin acts as an
    // authorizer for another plugin.
    pub trust_all_plugins: bool,
    pub trusted_plugins: Vec<String>,

    /// External command the runner executes for this plugin, if any.
    pub exec: Option<String>,
}

impl PluginSpec {
    /// Whether `command` requires elevation, and if so whether it must
    /// re-challenge regardless of any cached elevation.
    pub fn elevation_for(&self, command: &str) -> Option<bool> {
        if self.elevate_immediate_commands.iter().any(|c| c == command) {
            return Some(true);
        }
        if self.elevated_commands.iter().any(|c| c == command) {
            return Some(false);
        }
        None
    }

    /// Whether this plugin, acting as an authorizer, trusts `caller`.
    pub fn trusts(&self, caller: &str) -> bool {
        self.trust_all_plugins || self.trusted_plugins.iter().any(|p| p == caller)
    }
}
