// * Alerting - best-effort failure notifications
// * A sink never fails the caller: delivery problems end in a log line

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::constants::{ALERT_TIMEOUT_SECS, TELEGRAM_API_BASE};

#[derive(Debug, Error)]
pub enum AlertDeliveryError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Telegram answered {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Trait for alert sinks
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Delivers `message` if it can. Never errors and returns once the transport is done.
    async fn notify(&self, message: &str);
}

#[async_trait]
impl<T: AlertSink + ?Sized> AlertSink for Box<T> {
    async fn notify(&self, message: &str) {
        (**self).notify(message).await
    }
}

#[async_trait]
impl<T: AlertSink + ?Sized> AlertSink for Arc<T> {
    async fn notify(&self, message: &str) {
        (**self).notify(message).await
    }
}

/// Sink that only writes the alert to the log
#[derive(Debug, Default)]
pub struct LoggingAlerter;

#[async_trait]
impl AlertSink for LoggingAlerter {
    async fn notify(&self, message: &str) {
        tracing::warn!(channel = "log", "ALERT: {}", message);
    }
}

/// Telegram bot credentials and target chat
#[derive(Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub api_base: String,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            api_base: TELEGRAM_API_BASE.to_string(),
        }
    }

    /// Points the alerter at another Bot API host (self-hosted server, tests)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_base.trim_end_matches('/'),
            self.bot_token
        )
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Sink posting to the Telegram Bot API `sendMessage` method
pub struct TelegramAlerter {
    config: TelegramConfig,
    client: Client,
}

impl TelegramAlerter {
    pub fn new(config: TelegramConfig) -> Result<Self, AlertDeliveryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(ALERT_TIMEOUT_SECS))
            .build()?;
        Ok(Self { config, client })
    }

    /// Single delivery attempt; the caller decides what to do with the error
    pub async fn deliver(&self, message: &str) -> Result<(), AlertDeliveryError> {
        let payload = SendMessage {
            chat_id: &self.config.chat_id,
            text: message,
        };

        let response = self
            .client
            .post(self.config.send_message_url())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(AlertDeliveryError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl AlertSink for TelegramAlerter {
    async fn notify(&self, message: &str) {
        match self.deliver(message).await {
            Ok(()) => tracing::info!(chat_id = %self.config.chat_id, "Alert sent to Telegram"),
            Err(AlertDeliveryError::Rejected { status, body }) => {
                tracing::error!(status, "Failed to send message to Telegram: {}", body)
            }
            Err(e) => tracing::error!(error = %e, "Error sending message to Telegram"),
        }
    }
}
