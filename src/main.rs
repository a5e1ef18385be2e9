//! Formrelay CLI entry point.
//!
//! Provides `start`, `check` and `parse` subcommands for running the bridge,
//! validating a deployment, or extracting a saved payload offline.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{error, info};

use formrelay::config::{runtime_paths, Config};
use formrelay::credentials::{
    load_credentials, JIRA_API_TOKEN, JIRA_EMAIL, SLACK_APP_TOKEN, SLACK_BOT_TOKEN,
};
use formrelay::extractor::{self, LogicalChannel};
use formrelay::gateway::gmail::GmailGateway;
use formrelay::gateway::google::TokenManagers;
use formrelay::gateway::jira::JiraGateway;
use formrelay::gateway::sheets::SheetsGateway;
use formrelay::pipeline::Pipeline;
use formrelay::router::{DispatchSettings, Dispatcher};
use formrelay::slack::client::SlackClient;
use formrelay::slack::socket::spawn_socket_listener;

/// Inbound event queue depth between the listener and the pipeline.
const EVENT_BUFFER: usize = 100;

/// How long in-flight events may keep running after Ctrl-C.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(20);

/// Formrelay: routes Slack form submissions to Jira, Gmail and Sheets.
#[derive(Parser)]
#[command(name = "formrelay", version, about)]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Connect to Slack and process events until Ctrl-C.
    Start,
    /// Validate configuration and credentials, then print the channel map.
    Check,
    /// Extract a saved events-API payload and print the record as JSON.
    Parse {
        /// Logical channel: idea, issue, feedback or test.
        #[arg(long)]
        channel: String,
        /// JSON file holding the payload.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Start => handle_start().await,
        Command::Check => handle_check(),
        Command::Parse { channel, file } => handle_parse(&channel, &file),
    }
}

/// Run the bridge.
async fn handle_start() -> anyhow::Result<()> {
    let paths = runtime_paths()?;
    let config = Config::load(&paths)
        .with_context(|| format!("failed to load {}", paths.config_file.display()))?;
    config.validate().context("invalid configuration")?;

    let _logging_guard = formrelay::logging::init_production(&config.logs_dir(&paths))?;

    let credentials = load_credentials(&paths.env_file)
        .with_context(|| format!("failed to load {}", paths.env_file.display()))?;
    credentials.require_all()?;

    let channels = config.channel_map()?;

    let slack = Arc::new(SlackClient::with_api_base(
        credentials.require(SLACK_BOT_TOKEN)?,
        credentials.require(SLACK_APP_TOKEN)?,
        &config.slack.api_base,
    ));
    let identity = slack
        .auth_test()
        .await
        .context("Slack auth.test failed")?;
    info!(user_id = ?identity.user_id, bot_id = ?identity.bot_id, "authenticated with Slack");

    let jira = Arc::new(JiraGateway::new(
        &config.jira.base_url,
        credentials.require(JIRA_EMAIL)?,
        credentials.require(JIRA_API_TOKEN)?,
        config.jira.retries,
    ));

    let settings = DispatchSettings {
        project_key: config.jira.project_key.clone(),
        intake_sprint_id: config.jira.intake_sprint_id,
        email_subject: config.email.subject.clone(),
    };
    let mut dispatcher = Dispatcher::new(slack.clone(), jira, settings);

    let mut token_managers = TokenManagers::default();
    if let (true, Some(token_file)) = (config.email.enabled, &config.email.token_file) {
        let tokens = token_managers.for_path(token_file);
        dispatcher = dispatcher.with_email(Arc::new(GmailGateway::new(
            tokens,
            config.email.sender_alias.clone(),
        )));
        info!(sender = %config.email.sender_alias, "thank-you email enabled");
    }
    if let (true, Some(token_file)) = (config.sheets.enabled, &config.sheets.token_file) {
        let tokens = token_managers.for_path(token_file);
        dispatcher = dispatcher.with_sheets(Arc::new(SheetsGateway::new(
            tokens,
            config.sheets.spreadsheet_id.clone(),
            config.sheets.sheet_name.clone(),
        )));
        info!(spreadsheet_id = %config.sheets.spreadsheet_id, "spreadsheet logging enabled");
    }

    if !token_managers.is_empty() {
        info!(token_files = token_managers.len(), "Google token files in use");
    }

    let pipeline = Arc::new(Pipeline::new(channels, dispatcher, identity));
    let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
    let listener = spawn_socket_listener(Arc::clone(&slack), event_tx);

    info!(channels = config.channels.len(), "formrelay started");

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown requested"),
            Err(e) => {
                error!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        }
    };
    pipeline.run(event_rx, shutdown, SHUTDOWN_DRAIN).await;
    info!("pipeline stopped");

    listener.abort();
    Ok(())
}

/// Validate configuration and credentials without connecting.
fn handle_check() -> anyhow::Result<()> {
    formrelay::logging::init_cli();

    let paths = runtime_paths()?;
    let config = Config::load(&paths)
        .with_context(|| format!("failed to load {}", paths.config_file.display()))?;
    config.validate().context("invalid configuration")?;

    let credentials = load_credentials(&paths.env_file)
        .with_context(|| format!("failed to load {}", paths.env_file.display()))?;
    credentials.require_all()?;

    println!("config: {}", paths.config_file.display());
    println!("credentials: {}", paths.env_file.display());
    println!("jira project: {}", config.jira.project_key);
    for (channel_id, channel) in config.channel_map()?.entries() {
        println!("channel {channel_id} -> {channel}");
    }
    println!("email: {}", if config.email.enabled { "enabled" } else { "disabled" });
    println!("sheets: {}", if config.sheets.enabled { "enabled" } else { "disabled" });
    Ok(())
}

/// Extract one saved payload offline.
fn handle_parse(channel_name: &str, file: &Path) -> anyhow::Result<()> {
    formrelay::logging::init_cli();

    let channel = LogicalChannel::from_name(channel_name).ok_or_else(|| {
        anyhow::anyhow!("unknown channel {channel_name:?}; expected idea, issue, feedback or test")
    })?;

    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let mut payload: serde_json::Value = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;

    // A bare event object is accepted and wrapped.
    if payload.get("event").is_none() {
        payload = serde_json::json!({ "event": payload });
    }

    let record = extractor::extract(&channel, &payload)?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
