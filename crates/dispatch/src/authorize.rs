//! Authorization chain: a matched plugin may delegate approval of its
//! commands to another plugin, invoked synchronously with the reserved
//! `authorize` command before anything is scheduled.

use std::sync::Arc;

use tracing::{error, warn};

use {
    clatter_common::PluginRetVal,
    clatter_plugins::{Invocation, PluginRunner, PluginSpec, plugin_available},
};

use crate::{AUTHORIZE_COMMAND, respond::Responder};

const UNABLE: &str = "Sorry, I'm unable to authorize you for that command in this channel";
const DENIED: &str = "Sorry, you're not authorized for that command in this channel";
const MECHANISM: &str = "Sorry, I'm unable to perform authorization for that command in this channel";

/// Run the authorization chain for a matched command. Returns whether the
/// invocation may proceed. Plugins without an authorizer always pass.
///
/// Denial (the authorizer said no) and mechanism failure (missing,
/// untrusting, unavailable, or misbehaving authorizer) are distinct log
/// events even where the user-facing text is similar.
pub(crate) async fn authorize(
    responder: &Responder,
    runner: &Arc<dyn PluginRunner>,
    snapshot: &[Arc<PluginSpec>],
    admins: &[String],
    plugin: &Arc<PluginSpec>,
    command: &str,
) -> bool {
    let Some(authorizer_name) = plugin.authorizer.as_deref() else {
        return true;
    };
    let user = responder.user();
    let channel = responder.channel();

    let Some(authorizer) = snapshot.iter().find(|p| p.name == authorizer_name) else {
        error!(
            authorizer = %authorizer_name,
            plugin = %plugin.name,
            command,
            user,
            "authorizer not found among registered plugins"
        );
        responder.say(MECHANISM).await;
        return false;
    };

    if !authorizer.trusts(&plugin.name) {
        error!(
            authorizer = %authorizer.name,
            plugin = %plugin.name,
            command,
            user,
            "authorizer does not trust the calling plugin"
        );
        responder.say(UNABLE).await;
        return false;
    }

    if !plugin_available(user, channel, admins, authorizer) {
        error!(
            authorizer = %authorizer.name,
            plugin = %plugin.name,
            command,
            user,
            channel = ?channel,
            auth_require = %plugin.auth_require,
            "authorizer not available in this channel"
        );
        responder.say(UNABLE).await;
        return false;
    }

    let invocation = Invocation {
        user: user.to_string(),
        channel: channel.map(str::to_string),
        plugin: Arc::clone(authorizer),
        command: AUTHORIZE_COMMAND.to_string(),
        // Third slot is reserved; authorizers take the auth level last.
        args: vec![
            plugin.name.clone(),
            command.to_string(),
            String::new(),
            plugin.auth_require.clone(),
        ],
        visible_errors: false,
        background: false,
    };
    match runner.run(invocation).await {
        PluginRetVal::Success => true,
        PluginRetVal::Fail => {
            warn!(
                authorizer = %authorizer.name,
                plugin = %plugin.name,
                command,
                user,
                auth_require = %plugin.auth_require,
                "authorization denied"
            );
            responder.say(DENIED).await;
            false
        },
        other => {
            error!(
                authorizer = %authorizer.name,
                plugin = %plugin.name,
                command,
                user,
                result = ?other,
                "authorizer mechanism failure"
            );
            responder.say(MECHANISM).await;
            false
        },
    }
}
