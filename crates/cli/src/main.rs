mod config;
mod connector;
mod runner;

use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    clap::Parser,
    tokio::io::{AsyncBufReadExt, BufReader},
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    clatter_common::Connector,
    clatter_dispatch::{
        CodeElevator, CodeElevatorConfig, Dispatcher, DispatcherConfig, ElevationTimeout, Elevator,
        Lifecycle, ReplyWaiters,
    },
    clatter_memory::ShortTermMemory,
    clatter_plugins::{PluginRegistry, compile_plugins},
};

use {config::BotConfig, connector::TerminalConnector, runner::ShellRunner};

#[derive(Parser)]
#[command(name = "clatter", about = "Chat-ops command dispatcher")]
struct Cli {
    /// Path to the bot configuration file.
    #[arg(long, short, default_value = "clatter.toml", env = "CLATTER_CONFIG")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,

    /// Per-invocation plugin execution timeout, in seconds.
    #[arg(long, default_value_t = 60)]
    plugin_timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }

    let config = BotConfig::load(&cli.config)?;
    let specs = compile_plugins(config.plugins.clone())?;

    let connector: Arc<dyn Connector> = Arc::new(TerminalConnector);
    let waiters = Arc::new(ReplyWaiters::new());
    let lifecycle = Arc::new(Lifecycle::new());
    let elevator: Option<Arc<dyn Elevator>> = config.elevator.as_ref().map(|e| {
        let timeout_type = if e.timeout_type == "absolute" {
            ElevationTimeout::Absolute
        } else {
            ElevationTimeout::Idle
        };
        Arc::new(CodeElevator::new(
            Arc::clone(&connector),
            Arc::clone(&waiters),
            CodeElevatorConfig {
                timeout: Duration::from_secs(e.timeout_secs),
                timeout_type,
                reply_timeout: Duration::from_secs(e.reply_timeout_secs),
            },
        )) as Arc<dyn Elevator>
    });

    let dispatcher = Arc::new(Dispatcher::new(DispatcherConfig {
        registry: Arc::new(PluginRegistry::with_plugins(specs)),
        memory: Arc::new(ShortTermMemory::new(config.listen_window())),
        waiters,
        lifecycle: Arc::clone(&lifecycle),
        runner: Arc::new(ShellRunner::new(
            Arc::clone(&connector),
            Duration::from_secs(cli.plugin_timeout),
        )),
        connector: Arc::clone(&connector),
        elevator,
        admins: config.admins.clone(),
    }));

    info!(
        name = %config.name,
        plugins = dispatcher.registry().snapshot().len(),
        "ready, reading messages from stdin"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim() == "/quit" {
            break;
        }
        match connector::parse_line(&config.name, &line) {
            // Each message dispatches on its own task so a plugin waiting
            // for a reply never blocks the read loop.
            Some(msg) => {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move { dispatcher.handle_message(msg).await });
            },
            None => warn!(line = %line, "ignoring malformed input line"),
        }
    }

    info!("input closed, draining in-flight plugins");
    lifecycle.shutdown().await;
    Ok(())
}
