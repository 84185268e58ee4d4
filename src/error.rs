//! Unified error handling for the bridge.
//!
//! `Auth` is fatal at startup (configuration problems surface as `anyhow`
//! errors in main before polling begins); everything else is caught at the
//! poll-cycle boundary and logged, so a single bad cycle never takes the
//! process down.

use thiserror::Error;

/// Unified error type for gateway and pipeline failures.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Token acquisition or refresh failed. Fatal at startup.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Transport-level failure talking to a remote gateway (network, TLS,
    /// timeout). Retried on the next poll cycle.
    #[error("gateway request failed: {0}")]
    Gateway(#[from] reqwest::Error),

    /// A remote gateway answered with a non-success status.
    #[error("gateway returned {status}: {body}")]
    GatewayStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Attachment content could not be decoded.
    #[error("could not decode attachment: {0}")]
    Decode(String),

    /// Task or attachment creation failed in the task service. The message is
    /// not retried.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

impl BridgeError {
    /// Create a decode error with a custom message.
    pub fn decode(message: impl Into<String>) -> Self {
        BridgeError::Decode(message.into())
    }

    /// Create a delivery error with a custom message.
    pub fn delivery(message: impl Into<String>) -> Self {
        BridgeError::Delivery(message.into())
    }
}

/// Check a gateway response status, capturing the body on failure.
pub async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, BridgeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BridgeError::GatewayStatus { status, body })
}
