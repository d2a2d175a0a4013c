//! End-to-end dispatch tests: matching, gating, lifecycle, and the reply
//! rendezvous, driven through a recording connector and runner.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    anyhow::Result,
    async_trait::async_trait,
    regex::Regex,
};

use {
    clatter_common::{Connector, InboundMessage, PluginRetVal},
    clatter_dispatch::{Dispatcher, DispatcherConfig, Elevator, Error, Lifecycle, ReplyWaiters},
    clatter_memory::ShortTermMemory,
    clatter_plugins::{
        Invocation, MatcherConfig, PluginConfig, PluginRegistry, PluginRunner, compile_plugins,
    },
};

// ── Test doubles ────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingConnector {
    messages: Mutex<Vec<(Option<String>, String)>>,
}

impl RecordingConnector {
    fn texts(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    fn count_containing(&self, needle: &str) -> usize {
        self.texts().iter().filter(|t| t.contains(needle)).count()
    }
}

#[async_trait]
impl Connector for RecordingConnector {
    async fn send_channel(&self, channel: &str, text: &str) -> Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((Some(channel.to_string()), text.to_string()));
        Ok(())
    }

    async fn send_direct(&self, user: &str, text: &str) -> Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((None, format!("@{user} {text}")));
        Ok(())
    }
}

/// Records every non-authorize invocation; answers `authorize` calls with a
/// configurable verdict.
struct RecordingRunner {
    invocations: Mutex<Vec<(String, String, Vec<String>)>>,
    auth_verdict: PluginRetVal,
}

impl RecordingRunner {
    fn new() -> Self {
        Self::with_auth(PluginRetVal::Success)
    }

    fn with_auth(auth_verdict: PluginRetVal) -> Self {
        Self {
            invocations: Mutex::new(Vec::new()),
            auth_verdict,
        }
    }

    fn commands_run(&self) -> Vec<(String, String, Vec<String>)> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl PluginRunner for RecordingRunner {
    async fn run(&self, invocation: Invocation) -> PluginRetVal {
        if invocation.command == "authorize" {
            return self.auth_verdict;
        }
        self.invocations.lock().unwrap().push((
            invocation.plugin.name.clone(),
            invocation.command,
            invocation.args,
        ));
        PluginRetVal::Success
    }
}

struct StubElevator {
    allow: bool,
}

#[async_trait]
impl Elevator for StubElevator {
    async fn elevate(&self, _user: &str, _channel: Option<&str>, _immediate: bool) -> bool {
        self.allow
    }
}

// ── Harness ─────────────────────────────────────────────────────────────

struct Harness {
    dispatcher: Dispatcher,
    connector: Arc<RecordingConnector>,
    runner: Arc<RecordingRunner>,
    waiters: Arc<ReplyWaiters>,
    lifecycle: Arc<Lifecycle>,
}

fn harness(plugins: Vec<PluginConfig>) -> Harness {
    harness_with(plugins, Duration::from_secs(77), RecordingRunner::new(), None)
}

fn harness_with(
    plugins: Vec<PluginConfig>,
    listen_window: Duration,
    runner: RecordingRunner,
    elevator: Option<Arc<dyn Elevator>>,
) -> Harness {
    let specs = compile_plugins(plugins).expect("test plugins compile");
    let connector = Arc::new(RecordingConnector::default());
    let runner = Arc::new(runner);
    let waiters = Arc::new(ReplyWaiters::new());
    let lifecycle = Arc::new(Lifecycle::new());
    let dispatcher = Dispatcher::new(DispatcherConfig {
        registry: Arc::new(PluginRegistry::with_plugins(specs)),
        memory: Arc::new(ShortTermMemory::new(listen_window)),
        waiters: Arc::clone(&waiters),
        lifecycle: Arc::clone(&lifecycle),
        runner: Arc::clone(&runner) as Arc<dyn PluginRunner>,
        connector: Arc::clone(&connector) as Arc<dyn Connector>,
        elevator,
        admins: vec!["root".to_string()],
    });
    Harness {
        dispatcher,
        connector,
        runner,
        waiters,
        lifecycle,
    }
}

impl Harness {
    /// Wait (briefly) for spawned plugin bodies to land.
    async fn settle(&self, expected_runs: usize) {
        tokio::time::sleep(Duration::from_millis(10)).await;
        for _ in 0..200 {
            if self.runner.commands_run().len() >= expected_runs && self.lifecycle.running() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}

fn plugin(name: &str) -> PluginConfig {
    PluginConfig {
        name: name.into(),
        all_channels: true,
        allow_direct: true,
        ..Default::default()
    }
}

fn cmd(command: &str, pattern: &str) -> MatcherConfig {
    MatcherConfig {
        command: command.into(),
        pattern: pattern.into(),
        contexts: Vec::new(),
    }
}

fn cmd_with_contexts(command: &str, pattern: &str, contexts: &[&str]) -> MatcherConfig {
    MatcherConfig {
        command: command.into(),
        pattern: pattern.into(),
        contexts: contexts.iter().map(|c| c.to_string()).collect(),
    }
}

fn directed(user: &str, channel: &str, text: &str) -> InboundMessage {
    InboundMessage::directed(user, Some(channel.to_string()), text)
}

// ── Matching ────────────────────────────────────────────────────────────

#[tokio::test]
async fn single_match_runs_with_capture_args() {
    let mut p = plugin("deploy");
    p.commands = vec![cmd("deploy", r"^deploy (\S+)$")];
    let h = harness(vec![p]);

    h.dispatcher
        .handle_message(directed("alice", "ops", "deploy web-1"))
        .await;
    h.settle(1).await;

    assert_eq!(h.runner.commands_run(), vec![(
        "deploy".to_string(),
        "deploy".to_string(),
        vec!["web-1".to_string()]
    )]);
}

#[tokio::test]
async fn ambiguous_match_runs_nothing_and_notifies_once() {
    let mut a = plugin("alpha");
    a.commands = vec![cmd("ping", r"^ping$")];
    let mut b = plugin("beta");
    b.commands = vec![cmd("ping", r"^ping$")];
    let h = harness(vec![a, b]);

    h.dispatcher
        .handle_message(directed("alice", "ops", "ping"))
        .await;
    h.settle(0).await;

    assert!(h.runner.commands_run().is_empty());
    assert_eq!(h.connector.count_containing("more than one plugin"), 1);
}

#[tokio::test]
async fn ambient_matchers_only_fire_for_undirected_messages() {
    let mut p = plugin("lurker");
    p.ambient = vec![cmd("overheard", r"coffee")];
    let h = harness(vec![p]);

    h.dispatcher
        .handle_message(InboundMessage::ambient("alice", "ops", "anyone for coffee?"))
        .await;
    h.settle(1).await;
    assert_eq!(h.runner.commands_run().len(), 1);
    assert_eq!(h.runner.commands_run()[0].1, "overheard");
}

#[tokio::test]
async fn unavailable_plugin_is_skipped() {
    let mut p = plugin("admin-only");
    p.require_admin = true;
    p.commands = vec![cmd("wipe", r"^wipe$")];
    let h = harness(vec![p]);

    h.dispatcher
        .handle_message(directed("alice", "ops", "wipe"))
        .await;
    h.settle(0).await;
    assert!(h.runner.commands_run().is_empty());

    h.dispatcher
        .handle_message(directed("root", "ops", "wipe"))
        .await;
    h.settle(1).await;
    assert_eq!(h.runner.commands_run().len(), 1);
}

// ── Context memory ──────────────────────────────────────────────────────

#[tokio::test]
async fn context_round_trip_resolves_pronoun() {
    let mut p = plugin("servers");
    p.commands = vec![
        cmd_with_contexts("deploy", r"^deploy (\S+)$", &["server"]),
        cmd_with_contexts("restart", r"^restart (\S+)$", &["server"]),
    ];
    let h = harness(vec![p]);

    h.dispatcher
        .handle_message(directed("alice", "ops", "deploy web-1"))
        .await;
    h.settle(1).await;
    h.dispatcher
        .handle_message(directed("alice", "ops", "restart it"))
        .await;
    h.settle(2).await;

    let runs = h.runner.commands_run();
    assert_eq!(runs[1], (
        "servers".to_string(),
        "restart".to_string(),
        vec!["web-1".to_string()]
    ));
}

#[tokio::test]
async fn unbound_pronoun_asks_for_clarification_and_runs_nothing() {
    let mut p = plugin("servers");
    p.commands = vec![cmd_with_contexts("restart", r"^restart (\S+)$", &["server"])];
    let h = harness(vec![p]);

    h.dispatcher
        .handle_message(directed("alice", "ops", "restart it"))
        .await;
    h.settle(0).await;

    assert!(h.runner.commands_run().is_empty());
    assert_eq!(h.connector.count_containing("don't remember which server"), 1);
}

// ── Empty-message replay and the listen window ──────────────────────────

#[tokio::test]
async fn empty_directed_message_replays_recent_unmatched_text() {
    let mut p = plugin("deploy");
    p.commands = vec![cmd("deploy", r"^deploy (\S+)$")];
    let h = harness_with(
        vec![p],
        Duration::from_millis(200),
        RecordingRunner::new(),
        None,
    );

    // Ambient, unmatched: becomes the remembered last message.
    h.dispatcher
        .handle_message(InboundMessage::ambient("alice", "ops", "deploy web-1"))
        .await;
    // Within the window, an empty directed message replays it.
    h.dispatcher
        .handle_message(directed("alice", "ops", ""))
        .await;
    h.settle(1).await;

    assert_eq!(h.runner.commands_run().len(), 1);
    assert_eq!(h.connector.count_containing("Yes?"), 0);
}

#[tokio::test]
async fn empty_directed_message_after_window_gets_generic_ack() {
    let mut p = plugin("deploy");
    p.commands = vec![cmd("deploy", r"^deploy (\S+)$")];
    let h = harness_with(
        vec![p],
        Duration::from_millis(30),
        RecordingRunner::new(),
        None,
    );

    h.dispatcher
        .handle_message(InboundMessage::ambient("alice", "ops", "deploy web-1"))
        .await;
    tokio::time::sleep(Duration::from_millis(60)).await;
    h.dispatcher
        .handle_message(directed("alice", "ops", ""))
        .await;
    h.settle(0).await;

    assert!(h.runner.commands_run().is_empty());
    assert_eq!(h.connector.count_containing("Yes?"), 1);
}

// ── Reply waiters ───────────────────────────────────────────────────────

#[tokio::test]
async fn waiter_receives_reply_and_suppresses_ambient_matching() {
    let mut p = plugin("lurker");
    p.ambient = vec![cmd("overheard", r".*")];
    let h = harness(vec![p]);

    let waiters = Arc::clone(&h.waiters);
    let wait = tokio::spawn(async move {
        waiters
            .wait(
                "alice",
                Some("ops"),
                Regex::new(r"^\d+$").unwrap(),
                Duration::from_secs(5),
            )
            .await
    });
    tokio::task::yield_now().await;

    h.dispatcher
        .handle_message(InboundMessage::ambient("alice", "ops", "42"))
        .await;
    let reply = wait.await.unwrap().unwrap();
    assert_eq!(reply.text, "42");
    assert!(reply.matched);

    // The waiter consumed the message: the catch-anything ambient matcher
    // never saw it.
    h.settle(0).await;
    assert!(h.runner.commands_run().is_empty());
}

#[tokio::test]
async fn command_interrupts_waiter_and_still_runs_exactly_once() {
    let mut p = plugin("deploy");
    p.commands = vec![cmd("deploy", r"^deploy (\S+)$")];
    let h = harness(vec![p]);

    let waiters = Arc::clone(&h.waiters);
    let wait = tokio::spawn(async move {
        waiters
            .wait(
                "alice",
                Some("ops"),
                Regex::new(r"^\d+$").unwrap(),
                Duration::from_secs(5),
            )
            .await
    });
    tokio::task::yield_now().await;

    h.dispatcher
        .handle_message(directed("alice", "ops", "deploy web-1"))
        .await;
    h.settle(1).await;

    assert!(matches!(
        wait.await.unwrap(),
        Err(Error::ReplyInterrupted)
    ));
    assert_eq!(h.runner.commands_run().len(), 1);
}

// ── Catch-alls ──────────────────────────────────────────────────────────

#[tokio::test]
async fn unmatched_directed_message_goes_to_catch_alls() {
    let mut p = plugin("helper");
    p.catch_all = true;
    let h = harness(vec![p]);

    h.dispatcher
        .handle_message(directed("alice", "ops", "do something weird"))
        .await;
    h.settle(1).await;

    assert_eq!(h.runner.commands_run(), vec![(
        "helper".to_string(),
        "catchall".to_string(),
        vec!["do something weird".to_string()]
    )]);
}

// ── Authorization ───────────────────────────────────────────────────────

fn authorized_pair(auth_trusts: bool) -> Vec<PluginConfig> {
    let mut target = plugin("deploy");
    target.commands = vec![cmd("deploy", r"^deploy (\S+)$")];
    target.authorizer = Some("guard".into());
    target.auth_require = "ops".into();
    let mut guard = plugin("guard");
    guard.trust_all_plugins = auth_trusts;
    vec![target, guard]
}

#[tokio::test]
async fn authorized_command_runs() {
    let h = harness(authorized_pair(true));
    h.dispatcher
        .handle_message(directed("alice", "ops", "deploy web-1"))
        .await;
    h.settle(1).await;
    assert_eq!(h.runner.commands_run().len(), 1);
}

#[tokio::test]
async fn authorization_denial_blocks_and_tells_the_user() {
    let h = harness_with(
        authorized_pair(true),
        Duration::from_secs(77),
        RecordingRunner::with_auth(PluginRetVal::Fail),
        None,
    );
    h.dispatcher
        .handle_message(directed("alice", "ops", "deploy web-1"))
        .await;
    h.settle(0).await;
    assert!(h.runner.commands_run().is_empty());
    assert_eq!(h.connector.count_containing("you're not authorized"), 1);
}

#[tokio::test]
async fn authorizer_mechanism_failure_blocks_with_generic_message() {
    let h = harness_with(
        authorized_pair(true),
        Duration::from_secs(77),
        RecordingRunner::with_auth(PluginRetVal::GeneralError),
        None,
    );
    h.dispatcher
        .handle_message(directed("alice", "ops", "deploy web-1"))
        .await;
    h.settle(0).await;
    assert!(h.runner.commands_run().is_empty());
    assert_eq!(
        h.connector.count_containing("unable to perform authorization"),
        1
    );
}

#[tokio::test]
async fn untrusting_authorizer_blocks() {
    let h = harness(authorized_pair(false));
    h.dispatcher
        .handle_message(directed("alice", "ops", "deploy web-1"))
        .await;
    h.settle(0).await;
    assert!(h.runner.commands_run().is_empty());
    assert_eq!(h.connector.count_containing("unable to authorize"), 1);
}

#[tokio::test]
async fn missing_authorizer_blocks() {
    let mut target = plugin("deploy");
    target.commands = vec![cmd("deploy", r"^deploy (\S+)$")];
    target.authorizer = Some("ghost".into());
    let h = harness(vec![target]);

    h.dispatcher
        .handle_message(directed("alice", "ops", "deploy web-1"))
        .await;
    h.settle(0).await;
    assert!(h.runner.commands_run().is_empty());
    assert_eq!(
        h.connector.count_containing("unable to perform authorization"),
        1
    );
}

// ── Elevation ───────────────────────────────────────────────────────────

fn elevated_plugin() -> PluginConfig {
    let mut p = plugin("deploy");
    p.commands = vec![cmd("deploy", r"^deploy (\S+)$")];
    p.elevated_commands = vec!["deploy".into()];
    p
}

#[tokio::test]
async fn elevation_fails_closed_without_a_provider() {
    let h = harness(vec![elevated_plugin()]);
    h.dispatcher
        .handle_message(directed("alice", "ops", "deploy web-1"))
        .await;
    h.settle(0).await;
    assert!(h.runner.commands_run().is_empty());
    assert_eq!(
        h.connector
            .count_containing("\"deploy\" command requires elevated privileges"),
        1
    );
}

#[tokio::test]
async fn elevation_denial_blocks() {
    let h = harness_with(
        vec![elevated_plugin()],
        Duration::from_secs(77),
        RecordingRunner::new(),
        Some(Arc::new(StubElevator { allow: false })),
    );
    h.dispatcher
        .handle_message(directed("alice", "ops", "deploy web-1"))
        .await;
    h.settle(0).await;
    assert!(h.runner.commands_run().is_empty());
}

#[tokio::test]
async fn elevation_grant_allows_run() {
    let h = harness_with(
        vec![elevated_plugin()],
        Duration::from_secs(77),
        RecordingRunner::new(),
        Some(Arc::new(StubElevator { allow: true })),
    );
    h.dispatcher
        .handle_message(directed("alice", "ops", "deploy web-1"))
        .await;
    h.settle(1).await;
    assert_eq!(h.runner.commands_run().len(), 1);
}

// ── Lifecycle ───────────────────────────────────────────────────────────

fn abortable_plugins() -> Vec<PluginConfig> {
    let mut admin = plugin("admin");
    admin.commands = vec![cmd("abort", r"^abort$"), cmd("ping", r"^ping$")];
    vec![admin]
}

#[tokio::test]
async fn shutdown_refuses_everything_but_abort() {
    let h = harness(abortable_plugins());
    h.lifecycle.shutdown().await;

    h.dispatcher
        .handle_message(directed("alice", "ops", "ping"))
        .await;
    h.settle(0).await;
    assert!(h.runner.commands_run().is_empty());
    assert_eq!(h.connector.count_containing("shutting down"), 1);

    h.dispatcher
        .handle_message(directed("alice", "ops", "abort"))
        .await;
    h.settle(1).await;
    assert_eq!(h.runner.commands_run().len(), 1);
    assert_eq!(h.runner.commands_run()[0].1, "abort");
}

#[tokio::test]
async fn pause_refuses_until_resumed() {
    let h = harness(abortable_plugins());
    h.lifecycle.pause();

    h.dispatcher
        .handle_message(directed("alice", "ops", "ping"))
        .await;
    h.settle(0).await;
    assert!(h.runner.commands_run().is_empty());
    assert_eq!(h.connector.count_containing("paused"), 1);

    h.lifecycle.resume();
    h.dispatcher
        .handle_message(directed("alice", "ops", "ping"))
        .await;
    h.settle(1).await;
    assert_eq!(h.runner.commands_run().len(), 1);
}

#[tokio::test]
async fn shutdown_skips_catch_alls() {
    let mut p = plugin("helper");
    p.catch_all = true;
    let h = harness(vec![p]);
    h.lifecycle.shutdown().await;

    h.dispatcher
        .handle_message(directed("alice", "ops", "anything at all"))
        .await;
    h.settle(0).await;
    assert!(h.runner.commands_run().is_empty());
}

// ── Bookkeeping ─────────────────────────────────────────────────────────

#[tokio::test]
async fn matched_message_clears_the_last_message_slot() {
    let mut p = plugin("deploy");
    p.commands = vec![cmd("deploy", r"^deploy (\S+)$")];
    let h = harness(vec![p]);

    h.dispatcher
        .handle_message(InboundMessage::ambient("alice", "ops", "deploy web-1"))
        .await;
    h.dispatcher
        .handle_message(directed("alice", "ops", "deploy web-2"))
        .await;
    h.settle(1).await;

    // The directed command cleared the slot, so a follow-up empty message
    // has nothing to replay.
    h.dispatcher
        .handle_message(directed("alice", "ops", ""))
        .await;
    h.settle(1).await;
    assert_eq!(h.connector.count_containing("Yes?"), 1);
    assert_eq!(h.runner.commands_run().len(), 1);
}
