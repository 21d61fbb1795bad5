//! Relay service: outbound messages and inbound updates from a remote chat service

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// One inbound update, already reduced to what the relay channel classifies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Monotonically increasing per-service sequence marker
    pub sequence: i64,
    /// Sender identity; None for updates that carry no message
    pub sender: Option<String>,
    pub text: Option<String>,
}

impl InboundMessage {
    pub fn new(sequence: i64, sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sequence,
            sender: Some(sender.into()),
            text: Some(text.into()),
        }
    }
}

/// Who the service says we are (reachability probe result)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: i64,
    pub username: Option<String>,
}

/// Errors from the remote service. Never shown to the agent verbatim; channels translate them.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("{method} request failed: {source}")]
    Http {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} failed with status {status}: {description}")]
    Status {
        method: &'static str,
        status: u16,
        description: String,
    },

    #[error("{method} rejected by service: {description}")]
    Rejected {
        method: &'static str,
        description: String,
    },

    #[error("{0}")]
    Other(String),
}

/// Remote chat service used by the relay channel (e.g. Telegram Bot API).
#[async_trait]
pub trait RelayService: Send + Sync {
    /// Provider name for logging (e.g. "telegram").
    fn name(&self) -> &str;

    /// Lightweight "who am I" probe. Sends nothing and consumes no updates.
    async fn identity(&self) -> Result<BotIdentity, RelayError>;

    /// Send one text message to `recipient`. Returns the service's message id.
    async fn send_message(&self, recipient: &str, text: &str) -> Result<i64, RelayError>;

    /// Fetch updates whose sequence is greater than `after` (everything pending when None),
    /// waiting at most `wait` for the first one to arrive.
    async fn fetch_updates(
        &self,
        after: Option<i64>,
        wait: Duration,
    ) -> Result<Vec<InboundMessage>, RelayError>;

    /// Highest sequence marker currently known to the service, without waiting.
    async fn latest_sequence(&self) -> Result<Option<i64>, RelayError>;
}
