//! Telegram Bot API client: sendMessage, getUpdates (long poll) and getMe.

use crate::models::{BotToken, TelegramSettings};
use crate::providers::relay::{BotIdentity, InboundMessage, RelayError, RelayService};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Extra HTTP time on top of the long-poll wait before the request is abandoned
const HTTP_GRACE: Duration = Duration::from_secs(10);
const SHORT_CALL_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram update payload (getUpdates result item)
#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    #[serde(default)]
    message: Option<TelegramMessage>,
    #[serde(default)]
    edited_message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    #[allow(dead_code)]
    message_id: i64,
    chat: TelegramChat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
    #[serde(default)]
    username: Option<String>,
}

impl From<TelegramUpdate> for InboundMessage {
    fn from(update: TelegramUpdate) -> Self {
        let message = update.message.or(update.edited_message);
        InboundMessage {
            sequence: update.update_id,
            sender: message.as_ref().map(|m| m.chat.id.to_string()),
            text: message.and_then(|m| m.text),
        }
    }
}

/// Telegram relay. The token only ever appears inside request URLs, which are stripped from
/// errors before they are returned.
pub struct TelegramClient {
    api_base: String,
    token: BotToken,
    client: Client,
}

impl TelegramClient {
    pub fn new(api_base: impl Into<String>, token: BotToken) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token,
            client: Client::new(),
        }
    }

    pub fn from_settings(settings: &TelegramSettings) -> Self {
        Self::new(settings.api_base.clone(), settings.token.clone())
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token.expose(), method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        body: serde_json::Value,
        timeout: Duration,
    ) -> Result<T, RelayError> {
        let http_err = |source: reqwest::Error| RelayError::Http {
            method,
            source: source.without_url(),
        };
        let res = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .timeout(timeout)
            .send()
            .await
            .map_err(http_err)?;
        let status = res.status();
        let text = res.text().await.map_err(http_err)?;
        parse_api_response(method, status.as_u16(), &text)
    }
}

/// Decode a Bot API envelope. Telegram reports most failures as `ok: false` with a description,
/// sometimes alongside a non-2xx status.
fn parse_api_response<T: DeserializeOwned>(
    method: &'static str,
    status: u16,
    body: &str,
) -> Result<T, RelayError> {
    let envelope: ApiResponse<T> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            return Err(RelayError::Status {
                method,
                status,
                description: format!("unreadable response: {}", e),
            })
        }
    };
    if !envelope.ok {
        let description = envelope
            .description
            .unwrap_or_else(|| "no description".to_string());
        return Err(if (200..300).contains(&status) {
            RelayError::Rejected {
                method,
                description,
            }
        } else {
            RelayError::Status {
                method,
                status,
                description,
            }
        });
    }
    envelope.result.ok_or_else(|| RelayError::Rejected {
        method,
        description: "missing result".to_string(),
    })
}

/// getUpdates `timeout` for a wait: rounded up and never 0, since 0 turns the long poll into a
/// busy loop. The caller's deadline still bounds the request.
fn long_poll_seconds(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

#[async_trait]
impl RelayService for TelegramClient {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn identity(&self) -> Result<BotIdentity, RelayError> {
        let user: TelegramUser = self
            .call("getMe", serde_json::json!({}), SHORT_CALL_TIMEOUT)
            .await?;
        Ok(BotIdentity {
            id: user.id,
            username: user.username,
        })
    }

    async fn send_message(&self, recipient: &str, text: &str) -> Result<i64, RelayError> {
        let body = serde_json::json!({
            "chat_id": recipient,
            "text": text,
        });
        let sent: SentMessage = self.call("sendMessage", body, SHORT_CALL_TIMEOUT).await?;
        Ok(sent.message_id)
    }

    async fn fetch_updates(
        &self,
        after: Option<i64>,
        wait: Duration,
    ) -> Result<Vec<InboundMessage>, RelayError> {
        let mut body = serde_json::json!({
            "timeout": long_poll_seconds(wait),
            "allowed_updates": ["message", "edited_message"],
        });
        if let Some(after) = after {
            body["offset"] = serde_json::json!(after + 1);
        }
        let updates: Vec<TelegramUpdate> =
            self.call("getUpdates", body, wait + HTTP_GRACE).await?;
        Ok(updates.into_iter().map(InboundMessage::from).collect())
    }

    async fn latest_sequence(&self) -> Result<Option<i64>, RelayError> {
        // Negative offset returns only the newest update
        let body = serde_json::json!({
            "offset": -1,
            "limit": 1,
            "timeout": 0,
        });
        let updates: Vec<TelegramUpdate> =
            self.call("getUpdates", body, SHORT_CALL_TIMEOUT).await?;
        Ok(updates.iter().map(|u| u.update_id).max())
    }
}
