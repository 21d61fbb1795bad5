//! Local dialog channel: one modal on the operator's screen

use crate::models::{Answer, Outcome, Request};
use crate::providers::{DialogError, DialogOutcome, DialogSurface};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::sleep_until;
use tokio_util::sync::CancellationToken;

pub struct LocalDialogChannel {
    surface: Arc<dyn DialogSurface>,
    // one modal at a time
    gate: Mutex<()>,
}

impl LocalDialogChannel {
    pub fn new(surface: Arc<dyn DialogSurface>) -> Self {
        Self {
            surface,
            gate: Mutex::new(()),
        }
    }

    pub fn surface_name(&self) -> &str {
        self.surface.name()
    }

    /// Whether a modal could be shown right now
    pub fn check_available(&self) -> Result<(), DialogError> {
        self.surface.check_available()
    }

    /// Show the prompt and wait. On deadline or cancel the pending `present` future is dropped,
    /// which closes the modal.
    pub async fn deliver(&self, request: &Request, cancel: CancellationToken) -> Outcome {
        if let Err(e) = self.surface.check_available() {
            tracing::warn!(surface = self.surface.name(), error = %e, "Dialog unavailable");
            return Outcome::unavailable(e);
        }

        let deadline = request.deadline();
        let _gate = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Outcome::Cancelled,
            _ = sleep_until(deadline) => return Outcome::TimedOut,
            gate = self.gate.lock() => gate,
        };

        let presented = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Outcome::Cancelled,
            _ = sleep_until(deadline) => return Outcome::TimedOut,
            presented = self.surface.present(request.prompt()) => presented,
        };

        match presented {
            Ok(closed) => {
                tracing::debug!(
                    surface = self.surface.name(),
                    request_id = %request.id(),
                    "Dialog closed by operator"
                );
                Outcome::fulfilled(answer_from(request, closed))
            }
            Err(e) => {
                tracing::warn!(surface = self.surface.name(), error = %e, "Dialog failed");
                Outcome::unavailable(e)
            }
        }
    }
}

fn answer_from(request: &Request, closed: DialogOutcome) -> Answer {
    match closed {
        DialogOutcome::Submitted(text) => Answer::interpret(&request.prompt().kind, &text),
        DialogOutcome::Selected(choices) => Answer::Choices(choices),
        DialogOutcome::Confirmed(confirmed) => Answer::Confirmed(confirmed),
        DialogOutcome::Acknowledged => Answer::Acknowledged,
        DialogOutcome::Dismissed => Answer::Dismissed,
    }
}
