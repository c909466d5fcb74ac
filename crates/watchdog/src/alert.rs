//! Outbound alert channel seam. The real operator-facing channel is an
//! external collaborator; delivery failures are logged, never fatal.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("alert transport error: {0}")]
    Transport(String),
    #[error("alert delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, message: &str) -> Result<(), AlertError>;
}

/// Writes alerts to the process log. Default sink when no webhook is
/// configured.
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn notify(&self, message: &str) -> Result<(), AlertError> {
        warn!(alert = message, "alert raised");
        Ok(())
    }
}

/// Forwards alerts to an HTTP webhook as `{"text": ...}` payloads.
pub struct WebhookAlertSink {
    http: reqwest::Client,
    url: String,
}

impl WebhookAlertSink {
    const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(url: impl Into<String>) -> Result<Self, AlertError> {
        let http = reqwest::Client::builder()
            .timeout(Self::DELIVERY_TIMEOUT)
            .build()
            .map_err(|err| AlertError::Transport(err.to_string()))?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn notify(&self, message: &str) -> Result<(), AlertError> {
        self.http
            .post(&self.url)
            .json(&json!({ "text": message }))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| AlertError::Delivery(err.to_string()))?;
        Ok(())
    }
}
