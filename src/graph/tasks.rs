//! Task-list gateway: creates tasks and uploads file attachments.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{ListResponse, TokenProvider, GRAPH_BASE};
use crate::error::{ensure_success, BridgeError};

/// File content uploaded to a task.
#[derive(Debug, Clone)]
pub struct FileBlob {
    pub name: String,
    pub content_type: String,
    /// Base64 of the file content, as the attachment endpoint expects.
    pub content_bytes: String,
}

/// One task list visible to the signed-in account (diagnostic listing).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListInfo {
    pub id: String,
    pub display_name: String,
}

/// Contract for the remote task-list service.
#[allow(async_fn_in_trait)]
pub trait TaskGateway {
    /// Create a task and return its id.
    async fn create_task(&self, list_id: &str, title: &str) -> Result<String, BridgeError>;

    /// Attach one file to an existing task.
    async fn attach_file(
        &self,
        list_id: &str,
        task_id: &str,
        file: &FileBlob,
    ) -> Result<(), BridgeError>;

    /// List the account's task lists.
    async fn list_task_lists(&self) -> Result<Vec<TaskListInfo>, BridgeError>;
}

#[derive(Debug, Deserialize)]
struct WireTask {
    id: String,
}

/// Graph To Do implementation of [`TaskGateway`].
pub struct GraphTaskClient {
    http: reqwest::Client,
    tokens: Arc<TokenProvider>,
    base_url: String,
}

impl GraphTaskClient {
    pub fn new(http: reqwest::Client, tokens: Arc<TokenProvider>) -> Self {
        Self {
            http,
            tokens,
            base_url: GRAPH_BASE.to_string(),
        }
    }
}

impl TaskGateway for GraphTaskClient {
    async fn create_task(&self, list_id: &str, title: &str) -> Result<String, BridgeError> {
        #[derive(Serialize)]
        struct CreateTask<'a> {
            title: &'a str,
        }

        let token = self.tokens.access_token().await?;
        let url = format!("{}/me/todo/lists/{}/tasks", self.base_url, list_id);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&CreateTask { title })
            .send()
            .await?;
        let task: WireTask = ensure_success(response).await?.json().await?;
        Ok(task.id)
    }

    async fn attach_file(
        &self,
        list_id: &str,
        task_id: &str,
        file: &FileBlob,
    ) -> Result<(), BridgeError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct CreateAttachment<'a> {
            #[serde(rename = "@odata.type")]
            odata_type: &'a str,
            name: &'a str,
            content_type: &'a str,
            content_bytes: &'a str,
        }

        let token = self.tokens.access_token().await?;
        let url = format!(
            "{}/me/todo/lists/{}/tasks/{}/attachments",
            self.base_url, list_id, task_id
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&CreateAttachment {
                odata_type: "#microsoft.graph.taskFileAttachment",
                name: &file.name,
                content_type: &file.content_type,
                content_bytes: &file.content_bytes,
            })
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn list_task_lists(&self) -> Result<Vec<TaskListInfo>, BridgeError> {
        let token = self.tokens.access_token().await?;
        let url = format!("{}/me/todo/lists", self.base_url);
        let response = self.http.get(&url).bearer_auth(&token).send().await?;
        let page: ListResponse<TaskListInfo> = ensure_success(response).await?.json().await?;
        Ok(page.value)
    }
}
