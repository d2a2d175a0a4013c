//! Per-message orchestration: matching, gating, and scheduling.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use {
    clatter_common::{Connector, InboundMessage, PluginRetVal},
    clatter_memory::ShortTermMemory,
    clatter_plugins::{Invocation, PluginRegistry, PluginRunner, PluginSpec},
};

use crate::{
    ABORT_COMMAND, CATCHALL_COMMAND,
    authorize::authorize,
    elevate::{Elevator, check_elevation},
    lifecycle::{Admission, Lifecycle, Refusal},
    matcher::{MatchOutcome, find_match},
    reply::ReplyWaiters,
    respond::Responder,
};

/// Everything a dispatcher needs, wired explicitly: no ambient globals.
pub struct DispatcherConfig {
    pub registry: Arc<PluginRegistry>,
    pub memory: Arc<ShortTermMemory>,
    pub waiters: Arc<ReplyWaiters>,
    pub lifecycle: Arc<Lifecycle>,
    pub runner: Arc<dyn PluginRunner>,
    pub connector: Arc<dyn Connector>,
    pub elevator: Option<Arc<dyn Elevator>>,
    pub admins: Vec<String>,
}

/// Routes inbound messages to plugin invocations.
///
/// The matching/gating pipeline runs synchronously and in order for each
/// message (including nested authorizer and elevator calls); only the
/// final approved plugin body is spawned as an independent task. Distinct
/// messages may be dispatched concurrently by the caller.
pub struct Dispatcher {
    registry: Arc<PluginRegistry>,
    memory: Arc<ShortTermMemory>,
    waiters: Arc<ReplyWaiters>,
    lifecycle: Arc<Lifecycle>,
    runner: Arc<dyn PluginRunner>,
    connector: Arc<dyn Connector>,
    elevator: Option<Arc<dyn Elevator>>,
    admins: Vec<String>,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            registry: config.registry,
            memory: config.memory,
            waiters: config.waiters,
            lifecycle: config.lifecycle,
            runner: config.runner,
            connector: config.connector,
            elevator: config.elevator,
            admins: config.admins,
        }
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn memory(&self) -> &Arc<ShortTermMemory> {
        &self.memory
    }

    pub fn waiters(&self) -> &Arc<ReplyWaiters> {
        &self.waiters
    }

    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    /// Process one inbound message end to end.
    pub async fn handle_message(&self, msg: InboundMessage) {
        let user = msg.user.as_str();
        let channel = msg.channel.as_deref();
        let responder = Responder::new(Arc::clone(&self.connector), user, channel);
        let snapshot = self.registry.snapshot();
        if channel.is_none() {
            trace!(user, text = %msg.text, "direct message received");
        }

        let mut matched = false;
        let mut text = msg.text.clone();

        // An empty directed message means "that last thing was for you",
        // if the last unmatched message is still within the listen window.
        if msg.directed && text.is_empty() {
            match self.memory.recall_last_message(user, channel) {
                Some(last) => {
                    debug!(user, channel = ?channel, "replaying last unmatched message");
                    text = last;
                },
                None => {
                    responder.say("Yes?").await;
                    matched = true;
                },
            }
        }

        let catch_alls: Vec<Arc<PluginSpec>> = if msg.directed {
            snapshot.iter().filter(|p| p.catch_all).cloned().collect()
        } else {
            Vec::new()
        };

        if msg.directed && !matched {
            matched = self
                .match_and_invoke(true, &responder, &snapshot, &text)
                .await;
        }

        // A pending reply waiter consumes the message either way: told it
        // was interrupted when a command matched, or handed the candidate
        // text. Ambient matching is skipped for a consumed message.
        let waiter_consumed = self.waiters.deliver(user, channel, &text, matched);

        if !matched && !waiter_consumed && !msg.directed {
            matched = self
                .match_and_invoke(false, &responder, &snapshot, &text)
                .await;
        }

        if msg.directed && !matched && !waiter_consumed {
            if self.lifecycle.is_shutting_down() {
                debug!(user, "shutting down, ignoring catch-all plugins");
            } else {
                debug!(user, text = %text, count = catch_alls.len(), "unmatched directed message, calling catch-alls");
                for plugin in catch_alls {
                    self.invoke(&responder, &snapshot, plugin, CATCHALL_COMMAND, vec![
                        text.clone(),
                    ])
                    .await;
                }
            }
        }

        if matched || waiter_consumed || msg.directed {
            self.memory.forget_last_message(user, channel);
        } else {
            self.memory.remember_last_message(user, channel, &text);
        }
    }

    /// Run the matcher engine and, on a clean single match, push the
    /// command through the gating pipeline. Returns whether the message
    /// counts as matched.
    async fn match_and_invoke(
        &self,
        check_commands: bool,
        responder: &Responder,
        snapshot: &[Arc<PluginSpec>],
        text: &str,
    ) -> bool {
        match find_match(
            check_commands,
            responder,
            snapshot,
            &self.memory,
            &self.admins,
            text,
        )
        .await
        {
            MatchOutcome::None => false,
            MatchOutcome::Handled => true,
            MatchOutcome::Run {
                plugin,
                command,
                args,
            } => {
                self.invoke(responder, snapshot, plugin, &command, args).await;
                true
            },
        }
    }

    /// Gate one candidate invocation (authorization, elevation, lifecycle
    /// admission, in that order) and schedule the plugin body.
    async fn invoke(
        &self,
        responder: &Responder,
        snapshot: &[Arc<PluginSpec>],
        plugin: Arc<PluginSpec>,
        command: &str,
        args: Vec<String>,
    ) {
        if !authorize(
            responder,
            &self.runner,
            snapshot,
            &self.admins,
            &plugin,
            command,
        )
        .await
        {
            return;
        }
        if !check_elevation(responder, self.elevator.as_ref(), &plugin, command).await {
            return;
        }

        match self.lifecycle.admit(command == ABORT_COMMAND) {
            Admission::Refused(Refusal::ShuttingDown) => {
                trace!(plugin = %plugin.name, command, "refused: shutting down");
                responder
                    .say("Sorry, I'm shutting down and can't start any new tasks")
                    .await;
            },
            Admission::Refused(Refusal::Paused) => {
                trace!(plugin = %plugin.name, command, "refused: paused");
                responder
                    .say("Sorry, I've been paused and can't start any new tasks")
                    .await;
            },
            Admission::Admitted(guard) => {
                let invocation = Invocation {
                    user: responder.user().to_string(),
                    channel: responder.channel().map(str::to_string),
                    plugin: Arc::clone(&plugin),
                    command: command.to_string(),
                    args,
                    visible_errors: true,
                    background: true,
                };
                let runner = Arc::clone(&self.runner);
                debug!(plugin = %plugin.name, command, "scheduling plugin");
                tokio::spawn(async move {
                    // Guard drops when the body finishes, panic included.
                    let _guard = guard;
                    let plugin_name = invocation.plugin.name.clone();
                    let command = invocation.command.clone();
                    match runner.run(invocation).await {
                        PluginRetVal::Ok | PluginRetVal::Success => {},
                        result => {
                            warn!(plugin = %plugin_name, command = %command, ?result, "plugin finished with failure");
                        },
                    }
                });
            },
        }
    }
}
