//! Remote relay channel: send the prompt once, then poll for the authorized responder's reply

use crate::models::{Answer, InputType, Outcome, Prompt, PromptKind, Request};
use crate::providers::{BotIdentity, InboundMessage, RelayError, RelayService};
use crate::services::logging::log_security_event;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// State threaded through every poll iteration of one delivery
struct PollState {
    /// Highest sequence marker consumed so far
    cursor: Option<i64>,
    deadline: Instant,
    cancel: CancellationToken,
}

impl PollState {
    fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    fn has_seen(&self, sequence: i64) -> bool {
        self.cursor.map_or(false, |c| sequence <= c)
    }

    fn advance(&mut self, sequence: i64) {
        self.cursor = Some(self.cursor.map_or(sequence, |c| c.max(sequence)));
    }
}

enum Step {
    Continue,
    Done(Outcome),
}

/// Delivers prompts to a single pre-authorized identity on a remote chat service.
///
/// The cursor lock is held for the whole delivery, so concurrent requests queue instead of
/// interleaving their polls.
pub struct RemoteRelayChannel {
    service: Arc<dyn RelayService>,
    responder: String,
    poll_timeout: Duration,
    retry_delay: Duration,
    cursor: Mutex<Option<i64>>,
}

impl RemoteRelayChannel {
    pub fn new(
        service: Arc<dyn RelayService>,
        responder: impl Into<String>,
        poll_timeout: Duration,
        retry_delay: Duration,
    ) -> Self {
        Self {
            service,
            responder: responder.into(),
            poll_timeout: poll_timeout.max(Duration::from_secs(1)),
            retry_delay,
            cursor: Mutex::new(None),
        }
    }

    pub fn responder(&self) -> &str {
        &self.responder
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    /// Reachability probe. Sends nothing and leaves the cursor alone.
    pub async fn probe(&self) -> Result<BotIdentity, RelayError> {
        self.service.identity().await
    }

    /// Current cursor value; waits while a delivery holds it.
    pub async fn cursor(&self) -> Option<i64> {
        *self.cursor.lock().await
    }

    pub async fn deliver(&self, request: &Request, cancel: CancellationToken) -> Outcome {
        let deadline = request.deadline();
        let channel = self.service.name();

        let mut guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Outcome::Cancelled,
            _ = sleep_until(deadline) => return Outcome::TimedOut,
            guard = self.cursor.lock() => guard,
        };

        // Seed past any backlog so replies sent before this request are never accepted
        let latest = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Outcome::Cancelled,
            _ = sleep_until(deadline) => return Outcome::TimedOut,
            latest = self.service.latest_sequence() => latest,
        };
        match latest {
            Ok(Some(latest)) => *guard = Some(guard.map_or(latest, |c| c.max(latest))),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(channel, request_id = %request.id(), error = %e, "Cursor seed failed");
                return Outcome::unavailable(format!("{} is not reachable", channel));
            }
        }

        let text = render_prompt(request.prompt());
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Outcome::Cancelled,
            _ = sleep_until(deadline) => return Outcome::TimedOut,
            sent = self.service.send_message(&self.responder, &text) => sent,
        };
        match sent {
            Ok(message_id) => {
                tracing::info!(
                    channel,
                    request_id = %request.id(),
                    message_id,
                    cursor = ?*guard,
                    "Prompt sent"
                );
            }
            Err(e) => {
                tracing::warn!(channel, request_id = %request.id(), error = %e, "Send failed");
                return Outcome::unavailable(format!("failed to send prompt via {}", channel));
            }
        }

        if !request.prompt().kind.expects_reply() {
            return Outcome::fulfilled(Answer::Acknowledged);
        }

        let mut state = PollState {
            cursor: *guard,
            deadline,
            cancel,
        };
        loop {
            let step = self.poll_once(&mut state, request).await;
            *guard = state.cursor;
            if let Step::Done(outcome) = step {
                tracing::debug!(
                    channel,
                    request_id = %request.id(),
                    cursor = ?state.cursor,
                    outcome = outcome.label(),
                    "Poll finished"
                );
                return outcome;
            }
        }
    }

    async fn poll_once(&self, state: &mut PollState, request: &Request) -> Step {
        if state.cancel.is_cancelled() {
            return Step::Done(Outcome::Cancelled);
        }
        let remaining = state.remaining();
        if remaining.is_zero() {
            return Step::Done(Outcome::TimedOut);
        }
        let wait = remaining.min(self.poll_timeout);

        let fetched = tokio::select! {
            biased;
            _ = state.cancel.cancelled() => return Step::Done(Outcome::Cancelled),
            _ = sleep_until(state.deadline) => return Step::Done(Outcome::TimedOut),
            fetched = self.service.fetch_updates(state.cursor, wait) => fetched,
        };

        let batch = match fetched {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(
                    channel = self.service.name(),
                    request_id = %request.id(),
                    error = %e,
                    "Fetching replies failed, retrying"
                );
                return tokio::select! {
                    biased;
                    _ = state.cancel.cancelled() => Step::Done(Outcome::Cancelled),
                    _ = sleep_until(state.deadline) => Step::Done(Outcome::TimedOut),
                    _ = sleep(self.retry_delay) => Step::Continue,
                };
            }
        };

        let reply = self.classify(state, batch);

        // A reply read after cancellation is dropped, never reported
        if state.cancel.is_cancelled() {
            return Step::Done(Outcome::Cancelled);
        }
        match reply {
            Some(text) => Step::Done(Outcome::fulfilled(Answer::interpret(
                &request.prompt().kind,
                &text,
            ))),
            None => Step::Continue,
        }
    }

    /// Advance the cursor past the whole batch and pick the first reply from the responder.
    fn classify(&self, state: &mut PollState, batch: Vec<InboundMessage>) -> Option<String> {
        let mut reply = None;
        for message in batch {
            if state.has_seen(message.sequence) {
                continue;
            }
            state.advance(message.sequence);
            if reply.is_some() {
                continue;
            }
            match (message.sender.as_deref(), message.text) {
                (Some(sender), Some(text)) if sender == self.responder => reply = Some(text),
                (Some(sender), None) if sender == self.responder => {
                    tracing::debug!(sequence = message.sequence, "Skipping non-text message");
                }
                (Some(sender), _) => log_security_event(
                    "unauthorized_sender",
                    self.service.name(),
                    sender,
                    message.sequence,
                ),
                (None, _) => {
                    tracing::debug!(sequence = message.sequence, "Skipping update without message");
                }
            }
        }
        reply
    }
}

/// Outbound text for a prompt: title, prompt, options, and a reply hint.
pub fn render_prompt(prompt: &Prompt) -> String {
    let mut out = String::new();
    if !prompt.title.trim().is_empty() {
        out.push_str(prompt.title.trim());
        out.push_str("\n\n");
    }
    out.push_str(&prompt.text);

    let hint = match &prompt.kind {
        PromptKind::Text { input_type, .. } => match input_type {
            InputType::Text => "Reply with your answer.",
            InputType::Integer => "Reply with a whole number.",
            InputType::Float => "Reply with a number.",
        },
        PromptKind::Multiline { .. } => "Reply with your answer. Multiple lines are fine.",
        PromptKind::Choice {
            choices,
            allow_multiple,
        } => {
            out.push('\n');
            for (idx, choice) in choices.iter().enumerate() {
                out.push_str(&format!("\n{}. {}", idx + 1, choice));
            }
            if *allow_multiple {
                "Reply with one or more numbers or options, separated by commas."
            } else {
                "Reply with the number or the text of your choice."
            }
        }
        PromptKind::Confirmation => "Reply yes or no.",
        PromptKind::Info => return out,
    };

    if let Some(default) = prompt.kind.default_value() {
        out.push_str(&format!("\n\nDefault: {}", default));
    }
    out.push_str("\n\n");
    out.push_str(hint);
    out
}
