//! Best-effort audit notices mirrored to the configured log channel.
//!
//! The mutation path never waits on delivery: `Notifier::notice` pushes the
//! event onto an unbounded channel and returns. A worker task renders each
//! notice into a log embed and hands it to the transport with a bounded
//! timeout. Every failure mode (worker gone, delivery error, timeout) is
//! logged and swallowed.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::embeds::{mention, EmbedBuilder, MessageTemplate, COLOR_CANCELLED, COLOR_LOG};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeAction {
    BalanceChecked,
    TransferRequested,
    TransferConfirmed,
    TransferCancelled,
    TransferExecuted,
}

impl NoticeAction {
    pub fn title(&self) -> &'static str {
        match self {
            Self::BalanceChecked => "Balance checked",
            Self::TransferRequested => "Transfer requested",
            Self::TransferConfirmed => "Transfer confirmed",
            Self::TransferCancelled => "Transfer cancelled",
            Self::TransferExecuted => "Transfer executed via API",
        }
    }

    fn is_cancellation(&self) -> bool {
        matches!(self, Self::TransferCancelled)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditNotice {
    pub action: NoticeAction,
    pub actor_id: String,
    pub details: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditNotice {
    pub fn new(action: NoticeAction, actor_id: impl Into<String>) -> Self {
        Self { action, actor_id: actor_id.into(), details: BTreeMap::new(), occurred_at: Utc::now() }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notice delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait NotifierTransport: Send + Sync {
    async fn deliver(&self, channel_id: &str, message: &MessageTemplate)
        -> Result<(), NotifyError>;
}

#[derive(Default)]
pub struct NoopNotifierTransport;

#[async_trait]
impl NotifierTransport for NoopNotifierTransport {
    async fn deliver(
        &self,
        _channel_id: &str,
        _message: &MessageTemplate,
    ) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Posts the log embed through the platform's REST message endpoint.
pub struct RestNotifierTransport {
    http: reqwest::Client,
    api_base_url: String,
    bot_token: String,
}

impl RestNotifierTransport {
    pub fn new(api_base_url: impl Into<String>, bot_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base_url: api_base_url.into(),
            bot_token: bot_token.into(),
        }
    }
}

#[async_trait]
impl NotifierTransport for RestNotifierTransport {
    async fn deliver(
        &self,
        channel_id: &str,
        message: &MessageTemplate,
    ) -> Result<(), NotifyError> {
        let url = format!("{}/channels/{channel_id}/messages", self.api_base_url);
        let response = self
            .http
            .post(url)
            .header("Authorization", format!("Bot {}", self.bot_token))
            .json(message)
            .send()
            .await
            .map_err(|error| NotifyError::Delivery(error.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Delivery(format!(
                "log channel rejected message: {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// Cloneable fire-and-forget handle to the notifier worker.
#[derive(Clone, Default)]
pub struct Notifier {
    sender: Option<mpsc::UnboundedSender<AuditNotice>>,
}

impl Notifier {
    /// A notifier that drops every notice. Used in tests and when no log
    /// channel is configured.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Spawns the delivery worker and returns its handle. `send_timeout`
    /// bounds each delivery attempt; a slow transport drops notices rather
    /// than backing up the channel forever.
    pub fn spawn(
        transport: Arc<dyn NotifierTransport>,
        channel_id: String,
        send_timeout: Duration,
    ) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<AuditNotice>();

        tokio::spawn(async move {
            while let Some(notice) = receiver.recv().await {
                let message = log_message(&notice);
                match tokio::time::timeout(send_timeout, transport.deliver(&channel_id, &message))
                    .await
                {
                    Ok(Ok(())) => {
                        debug!(
                            action = notice.action.title(),
                            actor_id = %notice.actor_id,
                            "audit notice delivered"
                        );
                    }
                    Ok(Err(error)) => {
                        warn!(
                            action = notice.action.title(),
                            actor_id = %notice.actor_id,
                            error = %error,
                            "audit notice delivery failed; dropping notice"
                        );
                    }
                    Err(_) => {
                        warn!(
                            action = notice.action.title(),
                            actor_id = %notice.actor_id,
                            timeout_ms = send_timeout.as_millis() as u64,
                            "audit notice delivery timed out; dropping notice"
                        );
                    }
                }
            }
        });

        Self { sender: Some(sender) }
    }

    /// Queues a notice. Never blocks, never fails the caller.
    pub fn notice(&self, notice: AuditNotice) {
        let Some(sender) = &self.sender else {
            return;
        };

        if sender.send(notice).is_err() {
            warn!("notifier worker has stopped; dropping notice");
        }
    }
}

fn log_message(notice: &AuditNotice) -> MessageTemplate {
    let color =
        if notice.action.is_cancellation() { COLOR_CANCELLED } else { COLOR_LOG };

    let mut builder = EmbedBuilder::new(color)
        .title(format!("📘 {}", notice.action.title()))
        .field("User", mention(&notice.actor_id));
    for (key, value) in &notice.details {
        builder = builder.field(key.clone(), value.clone());
    }

    MessageTemplate {
        content: None,
        embeds: vec![builder.timestamp_now().build()],
        components: Vec::new(),
        ephemeral: false,
    }
}
