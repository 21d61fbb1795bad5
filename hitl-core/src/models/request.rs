//! Request data structures

use crate::models::MAX_TIMEOUT_SECS;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Expected type of a single-line answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[default]
    Text,
    Integer,
    Float,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Text => "text",
            InputType::Integer => "integer",
            InputType::Float => "float",
        }
    }
}

/// Shape of the prompt presented to the human
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PromptKind {
    /// Single-line entry, optionally numeric
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_value: Option<String>,
        #[serde(default)]
        input_type: InputType,
    },
    /// Free-form multi-line entry
    Multiline {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_value: Option<String>,
    },
    /// Pick one (or several) of a fixed list
    Choice {
        choices: Vec<String>,
        #[serde(default)]
        allow_multiple: bool,
    },
    /// Yes/no question
    Confirmation,
    /// Acknowledgement only, no reply expected
    Info,
}

impl PromptKind {
    /// Whether a reply has to be collected after the prompt is shown.
    pub fn expects_reply(&self) -> bool {
        !matches!(self, PromptKind::Info)
    }

    pub fn name(&self) -> &'static str {
        match self {
            PromptKind::Text { .. } => "text",
            PromptKind::Multiline { .. } => "multiline",
            PromptKind::Choice { .. } => "choice",
            PromptKind::Confirmation => "confirmation",
            PromptKind::Info => "info",
        }
    }

    pub fn default_value(&self) -> Option<&str> {
        match self {
            PromptKind::Text { default_value, .. } | PromptKind::Multiline { default_value } => {
                default_value.as_deref().filter(|v| !v.is_empty())
            }
            _ => None,
        }
    }
}

/// What to ask the human
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub title: String,
    pub text: String,
    pub kind: PromptKind,
}

impl Prompt {
    pub fn new(title: impl Into<String>, text: impl Into<String>, kind: PromptKind) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            kind,
        }
    }

    /// Plain single-line text question
    pub fn text(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(
            title,
            text,
            PromptKind::Text {
                default_value: None,
                input_type: InputType::Text,
            },
        )
    }

    pub fn choice(
        title: impl Into<String>,
        text: impl Into<String>,
        choices: Vec<String>,
        allow_multiple: bool,
    ) -> Self {
        Self::new(
            title,
            text,
            PromptKind::Choice {
                choices,
                allow_multiple,
            },
        )
    }

    pub fn confirmation(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(title, text, PromptKind::Confirmation)
    }

    pub fn info(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(title, text, PromptKind::Info)
    }
}

/// A single ask, created when the coordinator accepts a prompt. Immutable after creation.
#[derive(Debug, Clone)]
pub struct Request {
    id: Uuid,
    prompt: Prompt,
    created_at: DateTime<Utc>,
    timeout: Duration,
    deadline: Instant,
}

impl Request {
    /// Create a request whose deadline starts counting now. Timeouts above
    /// [`MAX_TIMEOUT_SECS`] are capped.
    pub fn new(prompt: Prompt, timeout: Duration) -> Self {
        let timeout = timeout.min(Duration::from_secs(MAX_TIMEOUT_SECS));
        Self {
            id: Uuid::new_v4(),
            prompt,
            created_at: Utc::now(),
            timeout,
            deadline: Instant::now() + timeout,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn prompt(&self) -> &Prompt {
        &self.prompt
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline (zero once it has passed)
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}
