//! ctlpanel - operator console for the publication pipeline
//!
//! Tails the shared application log topic and issues pipeline commands
//! through the Kafka REST proxy.
//!
//! ## Commands
//!
//! - `tail`: follow the logs; accepts `build`, `deploy`, `clean` and `status`
//!   on stdin while running
//! - `build`: request a build of the configured collection for a date
//! - `deploy`: wait for a deployable build, then promote it
//! - `clean`: remove a run's staging tree

mod terminal;

use std::future::Future;
use std::io::Write;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ctlpanel_broker::{BrokerGateway, RestProxyClient};
use ctlpanel_core::{
    CommandPublisher, ConsoleConfig, ConsoleSink, DeployTarget, PollLoop, RunId, RunState,
    Session, SessionError, WorkflowView,
};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};

use terminal::{describe_view, TerminalSink};

#[derive(Parser)]
#[command(name = "ctlpanel")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operator console for the publication pipeline", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines and console output
    #[arg(long, global = true)]
    json: bool,

    /// Kafka REST proxy base URL
    #[arg(long, global = true, env = "CTLPANEL_PROXY_URL")]
    proxy_url: Option<String>,

    /// Application log topic to tail
    #[arg(long, global = true, env = "CTLPANEL_LOG_TOPIC")]
    log_topic: Option<String>,

    /// Web agent base URL, for preview and production links
    #[arg(long, global = true, env = "CTLPANEL_SITE_URL")]
    site_url: Option<String>,

    /// Delay between log polls, in milliseconds
    #[arg(long, global = true, env = "CTLPANEL_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow the application logs and the build/deploy workflow
    Tail,

    /// Request a build for a date
    Build {
        /// Date to build, YYYY-MM-DD
        date: String,
    },

    /// Wait for a completed build, then promote it
    Deploy {
        /// Run to deploy (default: the next run seen completing)
        run_id: Option<String>,

        /// Deployment target
        #[arg(long, value_enum, default_value = "prod")]
        target: TargetArg,

        /// Give up after this many seconds without a deployable build
        #[arg(long, default_value = "600")]
        wait_secs: u64,
    },

    /// Remove a run's staging tree
    Clean {
        /// Run to remove
        run_id: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TargetArg {
    Prod,
    Staging,
}

impl From<TargetArg> for DeployTarget {
    fn from(arg: TargetArg) -> Self {
        match arg {
            TargetArg::Prod => DeployTarget::Prod,
            TargetArg::Staging => DeployTarget::Staging,
        }
    }
}

/// A line typed into a running `tail` session.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConsoleCommand {
    Build(String),
    Deploy(Option<String>),
    Clean(String),
    Status,
    Help,
    Quit,
}

const CONSOLE_HELP: &str =
    "commands: build <YYYY-MM-DD> | deploy [run_id] | clean <run_id> | status | quit";

fn parse_console_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let arg = words.next().map(str::to_string);
    if words.next().is_some() {
        return Err(format!("too many arguments for '{}'", verb));
    }

    let command = match (verb, arg) {
        ("build", Some(date)) => ConsoleCommand::Build(date),
        ("build", None) => return Err("usage: build <YYYY-MM-DD>".to_string()),
        ("deploy", run_id) => ConsoleCommand::Deploy(run_id),
        ("clean", Some(run_id)) => ConsoleCommand::Clean(run_id),
        ("clean", None) => return Err("usage: clean <run_id>".to_string()),
        ("status", None) => ConsoleCommand::Status,
        ("help" | "?", None) => ConsoleCommand::Help,
        ("quit" | "exit" | "q", None) => ConsoleCommand::Quit,
        (other, _) => return Err(format!("unknown command '{}'; {}", other, CONSOLE_HELP)),
    };
    Ok(Some(command))
}

/// The run a one-shot deploy should promote, once the state allows it.
fn deployable_run(state: &RunState, wanted: Option<&RunId>) -> Option<RunId> {
    let latest = state.latest_run_id.as_ref()?;
    if !state.can_deploy() {
        return None;
    }
    match wanted {
        Some(wanted) if wanted != latest => None,
        _ => Some(latest.clone()),
    }
}

fn load_config(cli: &Cli) -> Result<ConsoleConfig> {
    let mut config = ConsoleConfig::from_env().context("Invalid ctlpanel environment")?;
    if let Some(url) = &cli.proxy_url {
        config = config.with_proxy_url(url);
    }
    if let Some(topic) = &cli.log_topic {
        config = config.with_log_topic(topic);
    }
    if let Some(site) = &cli.site_url {
        config = config.with_site_url(site);
    }
    if let Some(ms) = cli.poll_interval_ms {
        config = config.with_poll_interval(Duration::from_millis(ms));
    }
    config.validate().context("Invalid ctlpanel configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    ctlpanel_core::telemetry::init_tracing(cli.json, level);

    let config = load_config(&cli)?;
    info!(proxy = %config.proxy_url, topic = %config.log_topic, "ctlpanel starting");
    let session = Session::connect(config).context("Failed to set up REST proxy client")?;

    match cli.command {
        Commands::Tail => cmd_tail(&session, cli.json).await,
        Commands::Build { date } => cmd_build(&session.publisher(), &date).await,
        Commands::Deploy {
            run_id,
            target,
            wait_secs,
        } => {
            cmd_deploy(
                &session,
                run_id.map(RunId::from),
                target.into(),
                Duration::from_secs(wait_secs),
                cli.json,
            )
            .await
        }
        Commands::Clean { run_id } => cmd_clean(&session.publisher(), &run_id).await,
    }
}

async fn cmd_build(publisher: &CommandPublisher<RestProxyClient>, date: &str) -> Result<()> {
    let command = publisher
        .publish_build(date)
        .await
        .context("Build request failed")?;
    println!(
        "Requested build of {} for {}",
        command.collection, command.date
    );
    Ok(())
}

async fn cmd_clean(publisher: &CommandPublisher<RestProxyClient>, run_id: &str) -> Result<()> {
    let command = publisher
        .publish_clean(&RunId::from(run_id))
        .await
        .context("Clean request failed")?;
    println!("Requested clean of {}", command.run_id);
    Ok(())
}

async fn cmd_deploy(
    session: &Session<RestProxyClient>,
    wanted: Option<RunId>,
    target: DeployTarget,
    wait: Duration,
    json: bool,
) -> Result<()> {
    let publisher = session.publisher();
    let mut state_rx = session.watch_state();
    let cancel = session.cancellation();
    let mut poll = session.poll_loop(TerminalSink::stdout(json));

    println!(
        "Waiting up to {}s for {} to finish building...",
        wait.as_secs(),
        wanted
            .as_ref()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "the next run".to_string())
    );

    let ready = wait_for_deployable(&mut state_rx, wanted.as_ref());
    let outcome = poll_until(&mut poll, &cancel, ready, wait, ctrl_c_signal)
        .await
        .context("Could not start log session");
    session.close().await;
    let outcome = outcome?;

    let Some(run_id) = outcome else {
        bail!("No deployable build observed");
    };
    let command = publisher
        .publish_deploy_to(&run_id, target)
        .await
        .context("Deploy request failed")?;
    println!("Requested deploy of {} to {:?}", command.run_id, command.target);
    Ok(())
}

/// Poll until `ready` yields, `wait` elapses or the operator interrupts.
///
/// The loop is then cancelled and allowed to finish its current cycle, so a
/// consumer it is still creating gets cached and released at teardown. A
/// second interrupt abandons that cycle.
async fn poll_until<B, S, T, I, F>(
    poll: &mut PollLoop<B, S>,
    cancel: &CancellationToken,
    ready: impl Future<Output = Option<T>>,
    wait: Duration,
    interrupt: I,
) -> std::result::Result<Option<T>, SessionError>
where
    B: BrokerGateway + ?Sized,
    S: ConsoleSink,
    I: Fn() -> F,
    F: Future<Output = ()>,
{
    let run = poll.run(cancel);
    tokio::pin!(run);

    let outcome = tokio::select! {
        biased;
        result = &mut run => {
            result?;
            return Ok(None);
        }
        found = ready => found,
        _ = tokio::time::sleep(wait) => None,
        _ = interrupt() => None,
    };

    cancel.cancel();
    match unless_interrupted(&mut run, interrupt()).await {
        Some(result) => result?,
        None => warn!("interrupted while the last poll cycle was in flight"),
    }
    Ok(outcome)
}

async fn wait_for_deployable(
    state_rx: &mut watch::Receiver<RunState>,
    wanted: Option<&RunId>,
) -> Option<RunId> {
    loop {
        if let Some(run) = deployable_run(&state_rx.borrow_and_update(), wanted) {
            return Some(run);
        }
        if state_rx.changed().await.is_err() {
            return None;
        }
    }
}

async fn cmd_tail(session: &Session<RestProxyClient>, json: bool) -> Result<()> {
    let publisher = session.publisher();
    let cancel = session.cancellation();
    let mut poll = session.poll_loop(TerminalSink::stdout(json));
    let mut lines = spawn_stdin_lines();

    println!(
        "ctlpanel {} on {} ({})",
        session.group(),
        session.config().log_topic,
        CONSOLE_HELP
    );

    loop {
        let outcome = {
            let run = poll.run(&cancel);
            tokio::pin!(run);
            loop {
                tokio::select! {
                    result = &mut run => break result,
                    Some(line) = lines.recv() => {
                        let handle = handle_console_line(&line, &publisher, session);
                        let handled = unless_interrupted(handle, ctrl_c_signal()).await;
                        match handled {
                            Some(false) => {}
                            Some(true) => cancel.cancel(),
                            None => {
                                eprintln!("Interrupted; '{}' abandoned", line.trim());
                                cancel.cancel();
                            }
                        }
                    }
                    _ = ctrl_c_signal() => cancel.cancel(),
                }
            }
        };

        match outcome {
            Ok(()) => break,
            Err(e) => {
                eprintln!("Could not start log session: {}", e);
                if !ask_retry(&mut lines, ctrl_c_signal()).await {
                    break;
                }
            }
        }
    }

    session.close().await;
    Ok(())
}

/// Returns `true` when the operator asked to quit.
async fn handle_console_line(
    line: &str,
    publisher: &CommandPublisher<RestProxyClient>,
    session: &Session<RestProxyClient>,
) -> bool {
    let command = match parse_console_command(line) {
        Ok(Some(command)) => command,
        Ok(None) => return false,
        Err(message) => {
            eprintln!("{}", message);
            return false;
        }
    };

    match command {
        ConsoleCommand::Build(date) => match publisher.publish_build(&date).await {
            Ok(cmd) => println!("Requested build of {} for {}", cmd.collection, cmd.date),
            Err(e) => eprintln!("Build failed: {}", e),
        },
        ConsoleCommand::Deploy(run_id) => {
            let result = match run_id {
                Some(run_id) => publisher.publish_deploy(&RunId::from(run_id)).await,
                None => publisher.deploy_latest().await,
            };
            match result {
                Ok(cmd) => println!("Requested deploy of {}", cmd.run_id),
                Err(e) => eprintln!("Deploy failed: {}", e),
            }
        }
        ConsoleCommand::Clean(run_id) => {
            match publisher.publish_clean(&RunId::from(run_id)).await {
                Ok(cmd) => println!("Requested clean of {}", cmd.run_id),
                Err(e) => eprintln!("Clean failed: {}", e),
            }
        }
        ConsoleCommand::Status => {
            let state = session.state();
            let view = WorkflowView::from_state(&state, session.config().site_url.as_deref());
            println!("{}", describe_view(&view));
        }
        ConsoleCommand::Help => println!("{}", CONSOLE_HELP),
        ConsoleCommand::Quit => return true,
    }
    false
}

/// An interrupt answers "no".
async fn ask_retry(
    lines: &mut mpsc::UnboundedReceiver<String>,
    interrupt: impl Future<Output = ()>,
) -> bool {
    print!("Retry? [y/N] ");
    let _ = std::io::stdout().flush();
    match unless_interrupted(lines.recv(), interrupt).await {
        Some(Some(answer)) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
        Some(None) => false,
        None => {
            println!();
            false
        }
    }
}

/// Run `work` unless `interrupt` fires first.
async fn unless_interrupted<T>(
    work: impl Future<Output = T>,
    interrupt: impl Future<Output = ()>,
) -> Option<T> {
    tokio::select! {
        out = work => Some(out),
        _ = interrupt => None,
    }
}

/// Resolves on Ctrl-C. Never resolves where the signal cannot be installed.
async fn ctrl_c_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Forward stdin lines from a dedicated thread so a pending read never holds
/// up runtime shutdown.
fn spawn_stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
