//! Mailbox gateway: fetches recent messages and attachment content.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{ListResponse, TokenProvider, GRAPH_BASE};
use crate::error::{ensure_success, BridgeError};

/// Message fetched from the mail gateway, before normalization.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub id: String,
    /// Sender address as reported by the provider; for SMS-forwarding
    /// gateways this starts with the originating phone number.
    pub from_address: String,
    pub subject: Option<String>,
    pub received_at: DateTime<Utc>,
    pub attachments: Vec<RawAttachment>,
}

#[derive(Debug, Clone)]
pub struct RawAttachment {
    pub id: String,
    pub name: String,
    pub content_type: String,
    /// Base64 content when the listing inlined it; small text bodies always
    /// arrive this way.
    pub content_bytes: Option<String>,
}

/// Contract for the remote mailbox.
#[allow(async_fn_in_trait)]
pub trait MailGateway {
    /// Fetch the most recent inbox messages, newest first.
    async fn fetch_recent(&self, limit: u32) -> Result<Vec<RawMessage>, BridgeError>;

    /// Download one attachment's decoded content bytes.
    async fn fetch_attachment(
        &self,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<Vec<u8>, BridgeError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    id: String,
    subject: Option<String>,
    received_date_time: DateTime<Utc>,
    from: Option<WireRecipient>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRecipient {
    email_address: Option<WireEmailAddress>,
}

#[derive(Debug, Deserialize)]
struct WireEmailAddress {
    name: Option<String>,
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAttachment {
    id: String,
    name: Option<String>,
    content_type: Option<String>,
    content_bytes: Option<String>,
}

/// Graph implementation of [`MailGateway`].
pub struct GraphMailClient {
    http: reqwest::Client,
    tokens: Arc<TokenProvider>,
    base_url: String,
}

impl GraphMailClient {
    pub fn new(http: reqwest::Client, tokens: Arc<TokenProvider>) -> Self {
        Self {
            http,
            tokens,
            base_url: GRAPH_BASE.to_string(),
        }
    }

    async fn list_attachments(
        &self,
        token: &str,
        message_id: &str,
    ) -> Result<Vec<RawAttachment>, BridgeError> {
        let url = format!("{}/me/messages/{}/attachments", self.base_url, message_id);
        let response = self.http.get(&url).bearer_auth(token).send().await?;
        let page: ListResponse<WireAttachment> = ensure_success(response).await?.json().await?;

        Ok(page
            .value
            .into_iter()
            .map(|wire| RawAttachment {
                id: wire.id,
                name: wire.name.unwrap_or_default(),
                content_type: wire.content_type.unwrap_or_default(),
                content_bytes: wire.content_bytes,
            })
            .collect())
    }
}

impl MailGateway for GraphMailClient {
    async fn fetch_recent(&self, limit: u32) -> Result<Vec<RawMessage>, BridgeError> {
        let token = self.tokens.access_token().await?;
        let url = format!("{}/me/mailFolders/inbox/messages", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .query(&[
                ("$top", limit.to_string()),
                ("$orderby", "receivedDateTime DESC".to_string()),
                ("$select", "id,subject,from,receivedDateTime".to_string()),
            ])
            .send()
            .await?;
        let page: ListResponse<WireMessage> = ensure_success(response).await?.json().await?;

        let mut messages = Vec::with_capacity(page.value.len());
        for wire in page.value {
            let attachments = self.list_attachments(&token, &wire.id).await?;
            let from_address = wire
                .from
                .and_then(|r| r.email_address)
                .and_then(|a| a.address.or(a.name))
                .unwrap_or_default();
            messages.push(RawMessage {
                id: wire.id,
                from_address,
                subject: wire.subject,
                received_at: wire.received_date_time,
                attachments,
            });
        }
        Ok(messages)
    }

    async fn fetch_attachment(
        &self,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<Vec<u8>, BridgeError> {
        let token = self.tokens.access_token().await?;
        let url = format!(
            "{}/me/messages/{}/attachments/{}",
            self.base_url, message_id, attachment_id
        );
        let response = self.http.get(&url).bearer_auth(&token).send().await?;
        let wire: WireAttachment = ensure_success(response).await?.json().await?;

        let encoded = wire
            .content_bytes
            .ok_or_else(|| BridgeError::decode(format!("attachment {attachment_id} has no content bytes")))?;
        BASE64_STANDARD
            .decode(encoded.trim())
            .map_err(|e| BridgeError::decode(format!("attachment {attachment_id}: {e}")))
    }
}
