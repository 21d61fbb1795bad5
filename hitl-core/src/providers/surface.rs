//! Display surface: a modal on-screen control shown to the local operator

use crate::models::Prompt;
use async_trait::async_trait;
use thiserror::Error;

/// How the modal was closed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogOutcome {
    /// Text typed into an entry or text area
    Submitted(String),
    /// Labels picked from a choice list
    Selected(Vec<String>),
    /// Yes/No answer
    Confirmed(bool),
    /// Info modal closed
    Acknowledged,
    /// Closed without an answer
    Dismissed,
}

/// Errors from the display surface
#[derive(Error, Debug)]
pub enum DialogError {
    #[error("No graphical session available: {0}")]
    NoDisplay(String),

    #[error("Dialog tool '{0}' not found")]
    ToolMissing(String),

    #[error("Failed to run dialog tool: {0}")]
    Launch(#[source] std::io::Error),

    #[error("Dialog tool failed: {0}")]
    Failed(String),
}

/// Creates modals, waits for them to close, destroys them.
#[async_trait]
pub trait DialogSurface: Send + Sync {
    /// Surface name for logging (e.g. "zenity").
    fn name(&self) -> &str;

    /// Whether a modal can be created at all in this session.
    fn check_available(&self) -> Result<(), DialogError>;

    /// Show one modal and wait for the operator. Dropping the returned future must close the
    /// modal.
    async fn present(&self, prompt: &Prompt) -> Result<DialogOutcome, DialogError>;
}
