//! Request validation
//!
//! Rejects prompts the coordinator must never accept: empty text, oversized text that the remote
//! service would refuse, malformed choice lists, and non-positive timeouts.

use crate::models::{Prompt, PromptKind};
use std::time::Duration;
use thiserror::Error;

/// Upper bound on prompt text; leaves room for the header and choice list inside a 4096-char
/// Telegram message.
pub const MAX_PROMPT_CHARS: usize = 3500;

/// Longest wait a single request may ask for (one week)
pub const MAX_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

/// Errors that can occur while validating a request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestValidationError {
    #[error("Prompt text is empty")]
    EmptyPrompt,

    #[error("Prompt text is too long (max {} characters)", MAX_PROMPT_CHARS)]
    PromptTooLong,

    #[error("Choice prompt needs at least one choice")]
    NoChoices,

    #[error("Choice {0} is empty")]
    EmptyChoice(usize),

    #[error("Duplicate choice: {0}")]
    DuplicateChoice(String),

    #[error("Timeout must be a positive number of seconds")]
    NonPositiveTimeout,

    #[error("Timeout is too long (max {} seconds)", MAX_TIMEOUT_SECS)]
    TimeoutTooLong,
}

/// Validate a prompt before a request is created for it
pub fn validate_prompt(prompt: &Prompt) -> Result<(), RequestValidationError> {
    if prompt.text.trim().is_empty() {
        return Err(RequestValidationError::EmptyPrompt);
    }

    if prompt.text.chars().count() > MAX_PROMPT_CHARS {
        return Err(RequestValidationError::PromptTooLong);
    }

    if let PromptKind::Choice { choices, .. } = &prompt.kind {
        if choices.is_empty() {
            return Err(RequestValidationError::NoChoices);
        }
        for (idx, choice) in choices.iter().enumerate() {
            if choice.trim().is_empty() {
                return Err(RequestValidationError::EmptyChoice(idx + 1));
            }
            if choices[..idx]
                .iter()
                .any(|earlier| earlier.trim().eq_ignore_ascii_case(choice.trim()))
            {
                return Err(RequestValidationError::DuplicateChoice(choice.clone()));
            }
        }
    }

    Ok(())
}

/// Pick the effective timeout: the override when given (positive, at most
/// [`MAX_TIMEOUT_SECS`]), else the default capped at the same bound
pub fn resolve_timeout(
    timeout_override: Option<Duration>,
    default: Duration,
) -> Result<Duration, RequestValidationError> {
    let max = Duration::from_secs(MAX_TIMEOUT_SECS);
    match timeout_override {
        Some(timeout) if timeout.is_zero() => Err(RequestValidationError::NonPositiveTimeout),
        Some(timeout) if timeout > max => Err(RequestValidationError::TimeoutTooLong),
        Some(timeout) => Ok(timeout),
        None => Ok(default.min(max)),
    }
}

/// Convert a caller-supplied number of seconds into a timeout override
pub fn timeout_from_seconds(seconds: i64) -> Result<Duration, RequestValidationError> {
    if seconds <= 0 {
        return Err(RequestValidationError::NonPositiveTimeout);
    }
    if seconds as u64 > MAX_TIMEOUT_SECS {
        return Err(RequestValidationError::TimeoutTooLong);
    }
    Ok(Duration::from_secs(seconds as u64))
}
