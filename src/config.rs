use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Runtime configuration, loaded once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Azure AD tenant the app is registered in
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,

    /// To Do list that receives the delivered tasks
    pub task_list_id: String,

    /// Path to a `phone_number,name` CSV of allowed senders
    pub contacts_csv_path: Option<String>,
    /// Inline CSV text, used when no path is configured
    pub contacts_csv_inline: Option<String>,

    /// How often to poll the mailbox (seconds)
    pub poll_interval_secs: u64,
    /// How many recent messages to fetch per poll
    pub fetch_limit: u32,

    /// Port the liveness endpoint listens on
    pub health_port: u16,
    /// Root directory for locally archived attachments
    pub attachment_root: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let contacts_csv_path = env::var("CONTACTS_CSV_PATH").ok();
        let contacts_csv_inline = env::var("CONTACTS_CSV").ok();
        if contacts_csv_path.is_none() && contacts_csv_inline.is_none() {
            anyhow::bail!("either CONTACTS_CSV_PATH or CONTACTS_CSV must be set");
        }

        Ok(Self {
            tenant_id: env::var("GRAPH_TENANT_ID").context("GRAPH_TENANT_ID must be set")?,
            client_id: env::var("GRAPH_CLIENT_ID").context("GRAPH_CLIENT_ID must be set")?,
            client_secret: env::var("GRAPH_CLIENT_SECRET")
                .context("GRAPH_CLIENT_SECRET must be set")?,
            task_list_id: env::var("TASK_LIST_ID").context("TASK_LIST_ID must be set")?,
            contacts_csv_path,
            contacts_csv_inline,
            poll_interval_secs: env::var("POLL_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(90),
            fetch_limit: env::var("FETCH_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            health_port: env::var("HEALTH_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8080),
            attachment_root: env::var("ATTACHMENT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("attachments")),
        })
    }
}
