//! Shell plugin runner: each invocation spawns the plugin's configured
//! external command with the command name and arguments as argv and the
//! invocation context in environment variables. Non-empty stdout lines are
//! relayed back through the connector.

use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    tokio::process::Command,
    tracing::{debug, error, warn},
};

use {
    clatter_common::{Connector, PluginRetVal},
    clatter_dispatch::Responder,
    clatter_plugins::{Invocation, PluginRunner},
};

pub struct ShellRunner {
    connector: Arc<dyn Connector>,
    timeout: Duration,
}

impl ShellRunner {
    pub fn new(connector: Arc<dyn Connector>, timeout: Duration) -> Self {
        Self { connector, timeout }
    }

    async fn report(&self, invocation: &Invocation, text: &str) {
        if invocation.visible_errors {
            Responder::new(
                Arc::clone(&self.connector),
                &invocation.user,
                invocation.channel.as_deref(),
            )
            .say(text)
            .await;
        }
    }
}

#[async_trait]
impl PluginRunner for ShellRunner {
    async fn run(&self, invocation: Invocation) -> PluginRetVal {
        let Some(exec) = invocation.plugin.exec.clone() else {
            error!(plugin = %invocation.plugin.name, "plugin has no exec command configured");
            self.report(
                &invocation,
                "Sorry, that plugin isn't set up correctly - ask an administrator to check the log",
            )
            .await;
            return PluginRetVal::TechnicalProblem;
        };

        debug!(
            plugin = %invocation.plugin.name,
            command = %invocation.command,
            exec = %exec,
            "spawning plugin process"
        );
        let spawned = Command::new(&exec)
            .arg(&invocation.command)
            .args(&invocation.args)
            .env("CLATTER_PLUGIN", &invocation.plugin.name)
            .env("CLATTER_USER", &invocation.user)
            .env(
                "CLATTER_CHANNEL",
                invocation.channel.as_deref().unwrap_or(""),
            )
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn();
        let child = match spawned {
            Ok(child) => child,
            Err(error) => {
                error!(plugin = %invocation.plugin.name, exec = %exec, %error, "failed to spawn plugin");
                self.report(&invocation, "Sorry, I ran into a technical problem with that")
                    .await;
                return PluginRetVal::TechnicalProblem;
            },
        };

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(error)) => {
                error!(plugin = %invocation.plugin.name, %error, "plugin process failed");
                self.report(&invocation, "Sorry, I ran into a technical problem with that")
                    .await;
                return PluginRetVal::TechnicalProblem;
            },
            Err(_) => {
                error!(
                    plugin = %invocation.plugin.name,
                    timeout = ?self.timeout,
                    "plugin process timed out"
                );
                self.report(&invocation, "Sorry, that took too long and I gave up on it")
                    .await;
                return PluginRetVal::TechnicalProblem;
            },
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            warn!(plugin = %invocation.plugin.name, stderr = %stderr.trim(), "plugin stderr");
        }

        // Plugin stdout is the reply text, one message per non-empty line.
        let responder = Responder::new(
            Arc::clone(&self.connector),
            &invocation.user,
            invocation.channel.as_deref(),
        );
        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            responder.say(line).await;
        }

        match output.status.code() {
            Some(0) => PluginRetVal::Success,
            Some(1) => PluginRetVal::Fail,
            code => {
                warn!(plugin = %invocation.plugin.name, ?code, "plugin exited abnormally");
                PluginRetVal::GeneralError
            },
        }
    }
}
