mod archive;
mod config;
mod contacts;
mod delivery;
mod delta;
mod error;
mod graph;
mod health;
mod message;
mod scheduler;
#[cfg(test)]
mod testutil;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::archive::AttachmentStore;
use crate::config::Config;
use crate::contacts::ContactDirectory;
use crate::graph::{GraphMailClient, GraphTaskClient, TaskGateway, TokenProvider};
use crate::scheduler::{PollScheduler, PollSettings};

#[derive(Parser)]
#[command(name = "sms-todo-bridge")]
#[command(about = "Bridges SMS-forwarded mailbox messages into a To Do task list")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the mailbox and deliver new messages as tasks (default)
    Run,
    /// Print the task lists visible to the signed-in account
    Lists,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sms_todo_bridge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::Lists => list_task_lists(config).await,
    }
}

async fn run(config: Config) -> Result<()> {
    tracing::info!("Starting SMS-to-todo bridge");

    let contacts = load_contacts(&config)?;
    tracing::info!("Loaded {} contacts", contacts.len());

    let (mail, tasks) = build_gateways(&config).await?;

    let health_port = config.health_port;
    tokio::spawn(async move {
        if let Err(e) = health::serve(health_port).await {
            tracing::error!("Liveness endpoint failed: {e:#}");
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut poller = PollScheduler::new(
        mail,
        tasks,
        contacts,
        AttachmentStore::new(config.attachment_root.clone()),
        PollSettings::from_config(&config),
    );
    let mut poll_handle = tokio::spawn(async move { poller.run(shutdown_rx).await });

    tokio::select! {
        result = &mut poll_handle => {
            result.context("poll loop task panicked")??;
        }
        _ = signal::ctrl_c() => {
            tracing::info!("Shutdown signal received, stopping...");
            shutdown_tx.send(true).ok();
            poll_handle.await.context("poll loop task panicked")??;
        }
    }

    tracing::info!("Bridge stopped");
    Ok(())
}

async fn list_task_lists(config: Config) -> Result<()> {
    let (_, tasks) = build_gateways(&config).await?;
    let lists = tasks
        .list_task_lists()
        .await
        .context("failed to list task lists")?;
    for list in lists {
        println!("{}  {}", list.id, list.display_name);
    }
    Ok(())
}

/// Build the Graph clients behind one HTTP client and token provider.
/// Token acquisition is verified here so credential problems are fatal
/// before any polling starts.
async fn build_gateways(config: &Config) -> Result<(GraphMailClient, GraphTaskClient)> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("failed to build HTTP client")?;

    let tokens = Arc::new(TokenProvider::new(
        http.clone(),
        &config.tenant_id,
        config.client_id.clone(),
        config.client_secret.clone(),
    ));
    tokens
        .access_token()
        .await
        .context("initial token acquisition failed")?;

    let mail = GraphMailClient::new(http.clone(), tokens.clone());
    let tasks = GraphTaskClient::new(http, tokens);
    Ok((mail, tasks))
}

fn load_contacts(config: &Config) -> Result<ContactDirectory> {
    if let Some(path) = &config.contacts_csv_path {
        return ContactDirectory::from_csv_path(Path::new(path))
            .with_context(|| format!("loading contacts from {path}"));
    }
    if let Some(text) = &config.contacts_csv_inline {
        return ContactDirectory::from_csv_str(text).context("parsing CONTACTS_CSV");
    }
    anyhow::bail!("either CONTACTS_CSV_PATH or CONTACTS_CSV must be set");
}
