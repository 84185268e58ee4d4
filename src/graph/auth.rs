//! App-only token acquisition for the Graph API.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::BridgeError;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Acquires an access token via the client-credentials grant and caches it
/// until shortly before expiry.
pub struct TokenProvider {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(
        http: reqwest::Client,
        tenant_id: &str,
        client_id: String,
        client_secret: String,
    ) -> Self {
        Self {
            http,
            token_url: format!(
                "https://login.microsoftonline.com/{tenant_id}/oauth2/v2.0/token"
            ),
            client_id,
            client_secret,
            cached: Mutex::new(None),
        }
    }

    /// Return a valid access token, refreshing when the cached one is within
    /// a minute of expiry.
    pub async fn access_token(&self) -> Result<String, BridgeError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() + Duration::seconds(60) {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.request_token().await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    async fn request_token(&self) -> Result<CachedToken, BridgeError> {
        #[derive(Serialize)]
        struct TokenRequest<'a> {
            client_id: &'a str,
            client_secret: &'a str,
            scope: &'a str,
            grant_type: &'a str,
        }

        let response = self
            .http
            .post(&self.token_url)
            .form(&TokenRequest {
                client_id: &self.client_id,
                client_secret: &self.client_secret,
                scope: "https://graph.microsoft.com/.default",
                grant_type: "client_credentials",
            })
            .send()
            .await
            .map_err(|e| BridgeError::Auth(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Auth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| BridgeError::Auth(format!("invalid token response: {e}")))?;

        Ok(CachedToken {
            access_token: tokens.access_token,
            expires_at: Utc::now() + Duration::seconds(tokens.expires_in),
        })
    }
}
