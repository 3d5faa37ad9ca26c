use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use lanfinitas_activity::ActivityFilter;
use lanfinitas_console::{
    console::run_activity_console, dump::run_dump, ApiClient, ConsoleConfig, Poller, Session,
    SnapshotState,
};

/// Lanfinitas activity console.
#[derive(Parser, Debug)]
#[command(name = "lanfinitas-console", version, about)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides config and LANFINITAS_API_URL).
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Bearer token (overrides config and LANFINITAS_API_TOKEN).
    #[arg(long, global = true)]
    token: Option<String>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Live terminal timeline (default).
    Watch,
    /// Fetch once and print the timeline.
    Dump {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
        /// Maximum number of events to print.
        #[arg(long, default_value_t = 50)]
        limit: usize,
        /// Event kinds to include, e.g. `tasks` or `task_failed,delegation_revoked`.
        #[arg(long, default_value = "all")]
        filter: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConsoleConfig::load(cli.config.as_deref())?;
    config.apply_env();
    if let Some(url) = cli.api_url {
        config.api.base_url = url;
    }
    if let Some(token) = cli.token {
        config.api.token = Some(token);
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    let command = cli.command.unwrap_or(Command::Watch);
    match &command {
        Command::Watch => init_file_logging(&config.logging.level, &config.log_file())?,
        Command::Dump { .. } => init_stderr_logging(&config.logging.level),
    }

    let session = Arc::new(Session::from_config(&config.api)?);
    let client = ApiClient::new(
        config.base_url(),
        session,
        Duration::from_secs(config.api.request_timeout_secs),
    )?;
    tracing::info!(
        base_url = client.base_url(),
        session = %client.session(),
        "Lanfinitas console starting"
    );
    let poller = Poller::new(Arc::new(client), SnapshotState::shared(), config.polling.clone());

    match command {
        Command::Watch => {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let handles = poller.spawn(shutdown_rx);

            let result = run_activity_console(poller, &config.console).await;

            let _ = shutdown_tx.send(true);
            for handle in handles {
                let _ = handle.await;
            }
            tracing::info!("Lanfinitas console stopped");
            result
        }
        Command::Dump {
            json,
            limit,
            filter,
        } => {
            let filter = ActivityFilter::parse(&filter).map_err(anyhow::Error::msg)?;
            let mut stdout = std::io::stdout().lock();
            run_dump(&poller, &filter, limit, json, &mut stdout).await
        }
    }
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// The TUI owns the terminal, so watch mode logs to a file.
fn init_file_logging(level: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn init_stderr_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(std::io::stderr)
        .init();
}
