//! Bridge coordinator: owns the lifecycle of every request
//!
//! `request` validates the prompt, stamps a deadline, selects a channel once, and races the
//! delivery against the deadline and the caller's cancellation token. Every accepted request
//! yields exactly one [`Resolution`].

use crate::channel::{Channel, ChannelKind, LocalDialogChannel, RemoteRelayChannel};
use crate::models::{
    resolve_timeout, validate_prompt, Configuration, Outcome, Prompt, Request,
    RequestValidationError,
};
use crate::providers::{NativeDialog, TelegramClient};
use crate::services::logging::log_interaction;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// What the coordinator hands back for one request
#[derive(Debug, Clone)]
pub struct Resolution {
    pub request_id: Uuid,
    /// Channel that served the request; None when none could be selected in time
    pub channel: Option<ChannelKind>,
    pub outcome: Outcome,
    pub elapsed: Duration,
}

/// Health probe result. Building it sends no message and leaves the cursor untouched.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub remote_configured: bool,
    pub remote_reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_username: Option<String>,
    pub dialog_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dialog_tool: Option<String>,
    pub default_timeout_seconds: u64,
    pub platform: &'static str,
    pub tools_available: Vec<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

pub struct BridgeCoordinator {
    remote: Option<RemoteRelayChannel>,
    local: Option<LocalDialogChannel>,
    default_timeout: Duration,
    fallback_to_dialog: bool,
}

impl BridgeCoordinator {
    pub fn new(
        remote: Option<RemoteRelayChannel>,
        local: Option<LocalDialogChannel>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            remote,
            local,
            default_timeout,
            fallback_to_dialog: false,
        }
    }

    /// Allow the local dialog when the remote relay fails before the prompt was sent.
    pub fn with_fallback_to_dialog(mut self, enabled: bool) -> Self {
        self.fallback_to_dialog = enabled;
        self
    }

    /// Wire up the Telegram relay and the native dialog from configuration.
    pub fn from_config(config: &Configuration) -> Self {
        let remote = config.telegram_settings().map(|settings| {
            RemoteRelayChannel::new(
                Arc::new(TelegramClient::from_settings(&settings)),
                settings.chat_id.clone(),
                settings.poll_timeout,
                settings.retry_delay,
            )
        });
        let local = config
            .dialog
            .enabled
            .then(|| LocalDialogChannel::new(Arc::new(NativeDialog::new())));

        tracing::info!(
            remote = remote.is_some(),
            dialog = local.is_some(),
            fallback_to_dialog = config.fallback_to_dialog,
            "Bridge configured"
        );
        Self::new(remote, local, config.default_timeout())
            .with_fallback_to_dialog(config.fallback_to_dialog)
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn remote_configured(&self) -> bool {
        self.remote.is_some()
    }

    pub fn remote(&self) -> Option<&RemoteRelayChannel> {
        self.remote.as_ref()
    }

    /// Ask the human. Only invalid input is an error; every other result is an [`Outcome`].
    pub async fn request(
        &self,
        prompt: Prompt,
        timeout_override: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<Resolution, RequestValidationError> {
        validate_prompt(&prompt)?;
        let timeout = resolve_timeout(timeout_override, self.default_timeout)?;
        let request = Request::new(prompt, timeout);
        let started = Instant::now();

        tracing::info!(
            request_id = %request.id(),
            kind = request.prompt().kind.name(),
            timeout_secs = timeout.as_secs(),
            "Request accepted"
        );

        let delivery = cancel.child_token();
        let mut selected = None;
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Outcome::Cancelled,
            _ = sleep_until(request.deadline()) => Outcome::TimedOut,
            outcome = self.run(&request, delivery.clone(), &mut selected) => outcome,
        };
        // Stops whatever the channel was still doing
        delivery.cancel();

        let channel = selected;
        log_interaction(
            "request_resolved",
            Some(request.id()),
            channel.map(|c| c.as_str()),
            Some(outcome.label()),
        );
        Ok(Resolution {
            request_id: request.id(),
            channel,
            outcome,
            elapsed: started.elapsed(),
        })
    }

    async fn run(
        &self,
        request: &Request,
        cancel: CancellationToken,
        selected: &mut Option<ChannelKind>,
    ) -> Outcome {
        let channel = match self.select_channel().await {
            Ok(channel) => channel,
            Err(reason) => return Outcome::unavailable(reason),
        };
        *selected = Some(channel.kind());
        tracing::debug!(request_id = %request.id(), channel = %channel.kind(), "Channel selected");

        let outcome = channel.deliver(request, cancel.clone()).await;

        // The relay only reports unavailable before its prompt went out
        if let (Outcome::ChannelUnavailable { reason }, Channel::Remote(_)) = (&outcome, &channel) {
            if self.fallback_to_dialog {
                if let Some(local) = &self.local {
                    tracing::warn!(
                        request_id = %request.id(),
                        reason = %reason,
                        "Remote relay failed to start, falling back to dialog"
                    );
                    *selected = Some(ChannelKind::LocalDialog);
                    return local.deliver(request, cancel).await;
                }
            }
        }
        outcome
    }

    /// Remote when configured and reachable, otherwise local.
    async fn select_channel(&self) -> Result<Channel<'_>, String> {
        let mut remote_failure = None;
        if let Some(remote) = &self.remote {
            match remote.probe().await {
                Ok(_) => return Ok(Channel::Remote(remote)),
                Err(e) => {
                    tracing::warn!(channel = remote.service_name(), error = %e, "Remote relay unreachable");
                    remote_failure = Some(format!("{} is not reachable", remote.service_name()));
                }
            }
        }
        match &self.local {
            Some(local) => Ok(Channel::Local(local)),
            None => Err(remote_failure.unwrap_or_else(|| "no channel configured".to_string())),
        }
    }

    pub async fn health(&self) -> HealthReport {
        let (remote_reachable, bot_username) = match &self.remote {
            Some(remote) => match remote.probe().await {
                Ok(identity) => (true, identity.username),
                Err(e) => {
                    tracing::warn!(channel = remote.service_name(), error = %e, "Health probe failed");
                    (false, None)
                }
            },
            None => (false, None),
        };
        let dialog_available = self
            .local
            .as_ref()
            .map(|local| local.check_available().is_ok())
            .unwrap_or(false);

        HealthReport {
            status: if remote_reachable || dialog_available {
                "healthy"
            } else {
                "degraded"
            },
            remote_configured: self.remote.is_some(),
            remote_reachable,
            bot_username,
            dialog_available,
            dialog_tool: self.local.as_ref().map(|l| l.surface_name().to_string()),
            default_timeout_seconds: self.default_timeout.as_secs(),
            platform: std::env::consts::OS,
            tools_available: Vec::new(),
        }
    }
}
