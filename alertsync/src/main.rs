//! alertsync - location-driven alert polling coordinator
//!
//! CLI entry point: drives a supervisor from JSON-line commands on stdin.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use alertsync::cli::{Cli, Command, StdinCommand};
use alertsync::config::Config;
use alertsync::domain::ParsedFilters;
use alertsync::service::create_service;
use alertsync::sink::AlertStore;
use alertsync::supervisor::Supervisor;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("alertsync")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("alertsync.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Watch { base_url } => cmd_watch(config, base_url).await,
        Command::Filters { search } => cmd_filters(&search),
        Command::Config => cmd_config(&config),
    }
}

/// Run the coordinator until stdin closes or Ctrl-C
async fn cmd_watch(mut config: Config, base_url: Option<String>) -> Result<()> {
    if let Some(base_url) = base_url {
        config.server.base_url = base_url;
    }
    info!(base_url = %config.server.base_url, "Starting watch");

    let service = create_service(&config.server).context("Failed to create alert service")?;
    let (store, sink) = AlertStore::spawn(config.sink.channel_buffer);
    let mut applied = store.subscribe();
    let supervisor = Supervisor::spawn(&config, service, sink);

    // Print every applied notification as one JSON line
    let printer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        loop {
            match applied.recv().await {
                Ok(notification) => {
                    let mut line = serde_json::to_vec(&notification)?;
                    line.push(b'\n');
                    stdout.write_all(&line).await?;
                    stdout.flush().await?;
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Output lagged, notifications dropped"),
                Err(RecvError::Closed) => break,
            }
        }
        Ok::<_, eyre::Report>(())
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let line = tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
            line = lines.next_line() => line.context("Failed to read stdin")?,
        };
        let Some(line) = line else {
            debug!("stdin closed");
            break;
        };

        match StdinCommand::parse_line(&line) {
            None => {}
            Some(Err(e)) => {
                warn!(error = %e, %line, "Ignoring malformed command");
                eprintln!("Ignoring malformed command: {}", e);
            }
            Some(Ok(StdinCommand::Location(event))) => {
                supervisor.navigate(event);
            }
            Some(Ok(StdinCommand::SelectPolicy { policy_id })) => {
                supervisor.select_policy(policy_id);
            }
            Some(Ok(StdinCommand::FetchAlert { alert_id })) => {
                supervisor.request_alert(alert_id).await?;
            }
        }
    }

    let report = supervisor.shutdown().await;
    let state = store.snapshot().await?;
    store.shutdown().await?;
    drop(store);
    printer.await.context("Output task failed")??;

    info!(?report, applied = state.notifications_applied, "Watch finished");
    eprintln!(
        "alertsync: {} notifications applied, {} poll tasks started, {} errors{}",
        state.notifications_applied,
        report.violations.started,
        state.errors.len(),
        state
            .server_unreachable
            .as_deref()
            .map(|banner| format!(", last banner: {}", banner))
            .unwrap_or_default()
    );
    Ok(())
}

/// Print parsed filters as JSON
fn cmd_filters(search: &str) -> Result<()> {
    let filters = ParsedFilters::parse(search);
    debug!(count = filters.len(), "cmd_filters: parsed");
    println!("{}", serde_json::to_string_pretty(&filters)?);
    Ok(())
}

/// Print the effective configuration as YAML
fn cmd_config(config: &Config) -> Result<()> {
    print!("{}", serde_yaml::to_string(config).context("Failed to serialize config")?);
    Ok(())
}
