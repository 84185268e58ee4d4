//! Clients for the remote Microsoft Graph mail and To Do endpoints.

pub mod auth;
pub mod mail;
pub mod tasks;

pub use auth::TokenProvider;
pub use mail::{GraphMailClient, MailGateway, RawAttachment, RawMessage};
pub use tasks::{FileBlob, GraphTaskClient, TaskGateway, TaskListInfo};

pub(crate) const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Graph collection responses wrap their items in a `value` array.
#[derive(Debug, serde::Deserialize)]
pub(crate) struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}
