//! Command and ambient matcher resolution with pronoun substitution.

use std::sync::Arc;

use tracing::{error, trace};

use {
    clatter_memory::{ContextBinding, ShortTermMemory},
    clatter_plugins::{PluginSpec, plugin_available},
};

use crate::respond::Responder;

/// Result of scanning the registry snapshot against one message.
pub(crate) enum MatchOutcome {
    /// Nothing matched.
    None,
    /// Matched, but nothing should run: a clarification or ambiguity
    /// notice was already sent.
    Handled,
    /// Exactly one plugin command matched and may proceed to gating.
    Run {
        plugin: Arc<PluginSpec>,
        command: String,
        args: Vec<String>,
    },
}

/// Scan plugins in registry order, testing command matchers (directed
/// messages) or ambient matchers against the full text. First matching
/// matcher wins within a plugin; two matching plugins is a fatal ambiguity
/// and nothing runs.
pub(crate) async fn find_match(
    check_commands: bool,
    responder: &Responder,
    snapshot: &[Arc<PluginSpec>],
    memory: &ShortTermMemory,
    admins: &[String],
    text: &str,
) -> MatchOutcome {
    let user = responder.user();
    let channel = responder.channel();
    let mut winner: Option<(Arc<PluginSpec>, String, Vec<String>)> = None;

    for plugin in snapshot {
        if !plugin_available(user, channel, admins, plugin) {
            trace!(plugin = %plugin.name, user, channel = ?channel, "plugin not available");
            continue;
        }
        let matchers = if check_commands {
            &plugin.commands
        } else {
            &plugin.ambient
        };
        for matcher in matchers {
            let Some(captures) = matcher.pattern.captures(text) else {
                continue;
            };
            trace!(plugin = %plugin.name, command = %matcher.command, "matcher hit");
            let mut args = capture_args(&captures);
            if !matcher.contexts.is_empty() {
                match memory.bind_contexts(user, channel, &matcher.contexts, &mut args) {
                    ContextBinding::Bound => {},
                    ContextBinding::Missing { label } => {
                        responder
                            .say(&format!(
                                "Sorry, I don't remember which {label} we were talking about - \
                                 please re-enter your command and be more specific"
                            ))
                            .await;
                        return MatchOutcome::Handled;
                    },
                }
            }
            if let Some((first, first_command, _)) = &winner {
                error!(
                    first = %first.name,
                    first_command = %first_command,
                    second = %plugin.name,
                    second_command = %matcher.command,
                    "message matched multiple plugins"
                );
                responder
                    .say("Yikes! That matched more than one plugin, so I'm not doing ANYTHING")
                    .await;
                return MatchOutcome::Handled;
            }
            winner = Some((Arc::clone(plugin), matcher.command.clone(), args));
            break;
        }
    }

    match winner {
        Some((plugin, command, args)) => MatchOutcome::Run {
            plugin,
            command,
            args,
        },
        None => MatchOutcome::None,
    }
}

/// Capture groups become command arguments; a group that did not
/// participate in the match contributes an empty string.
fn capture_args(captures: &regex::Captures<'_>) -> Vec<String> {
    captures
        .iter()
        .skip(1)
        .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
        .collect()
}
