//! Normalized outcome of a request, shared by every channel

use crate::models::{InputType, PromptKind};
use serde::Serialize;

/// Typed answer produced from what the human submitted
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Answer {
    Text(String),
    Integer(i64),
    Float(f64),
    Choices(Vec<String>),
    Confirmed(bool),
    /// Info prompt was shown (or sent)
    Acknowledged,
    /// The operator closed the surface without answering
    Dismissed,
}

impl Answer {
    /// Convert raw reply text into a typed answer for the given prompt kind.
    ///
    /// Replies that do not fit the kind (a word for a number, a label that is not in the list)
    /// come back as [`Answer::Text`] so the caller still sees what the human wrote.
    pub fn interpret(kind: &PromptKind, reply: &str) -> Answer {
        let trimmed = reply.trim();
        match kind {
            PromptKind::Text {
                input_type: InputType::Integer,
                ..
            } => trimmed
                .parse::<i64>()
                .map(Answer::Integer)
                .unwrap_or_else(|_| Answer::Text(reply.to_string())),
            PromptKind::Text {
                input_type: InputType::Float,
                ..
            } => match trimmed.parse::<f64>() {
                Ok(value) if value.is_finite() => Answer::Float(value),
                _ => Answer::Text(reply.to_string()),
            },
            PromptKind::Text { .. } | PromptKind::Multiline { .. } => {
                Answer::Text(reply.to_string())
            }
            PromptKind::Choice {
                choices,
                allow_multiple,
            } => resolve_choices(choices, *allow_multiple, trimmed)
                .map(Answer::Choices)
                .unwrap_or_else(|| Answer::Text(reply.to_string())),
            PromptKind::Confirmation => infer_confirmation(trimmed)
                .map(Answer::Confirmed)
                .unwrap_or_else(|| Answer::Text(reply.to_string())),
            PromptKind::Info => Answer::Acknowledged,
        }
    }

    /// Text form of the answer, as shown to the agent in `user_input` style fields.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Answer::Text(text) => Some(text.clone()),
            Answer::Integer(n) => Some(n.to_string()),
            Answer::Float(f) => Some(f.to_string()),
            Answer::Choices(choices) => Some(choices.join(", ")),
            Answer::Confirmed(true) => Some("yes".to_string()),
            Answer::Confirmed(false) => Some("no".to_string()),
            Answer::Acknowledged | Answer::Dismissed => None,
        }
    }
}

/// y/yes/ok/approve -> true, n/no/deny -> false, anything else is not a decision.
pub(crate) fn infer_confirmation(text: &str) -> Option<bool> {
    let t = text.trim().to_lowercase();
    match t.as_str() {
        "y" | "yes" | "ok" | "okay" | "approve" | "approved" | "true" | "1" | "👍" => Some(true),
        "n" | "no" | "deny" | "denied" | "reject" | "false" | "0" | "👎" => Some(false),
        _ => None,
    }
}

/// Match one token against the choice list: exact label (case-insensitive) first, then 1-based
/// index.
fn resolve_choice(choices: &[String], token: &str) -> Option<String> {
    let token = token.trim();
    if let Some(choice) = choices
        .iter()
        .find(|c| c.trim().eq_ignore_ascii_case(token))
    {
        return Some(choice.clone());
    }
    match token.parse::<usize>() {
        Ok(n) if n >= 1 && n <= choices.len() => Some(choices[n - 1].clone()),
        _ => None,
    }
}

fn resolve_choices(choices: &[String], allow_multiple: bool, reply: &str) -> Option<Vec<String>> {
    // Whole reply first: labels may themselves contain commas
    if let Some(single) = resolve_choice(choices, reply) {
        return Some(vec![single]);
    }
    if !allow_multiple {
        return None;
    }

    let mut selected: Vec<String> = Vec::new();
    for token in reply
        .split(|c| c == ',' || c == '\n')
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        let choice = resolve_choice(choices, token)?;
        if !selected.contains(&choice) {
            selected.push(choice);
        }
    }
    if selected.is_empty() {
        None
    } else {
        Some(selected)
    }
}

/// Exactly one of these is produced for every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Fulfilled { answer: Answer },
    TimedOut,
    Cancelled,
    ChannelUnavailable { reason: String },
}

impl Outcome {
    pub fn fulfilled(answer: Answer) -> Self {
        Outcome::Fulfilled { answer }
    }

    pub fn unavailable(reason: impl std::fmt::Display) -> Self {
        Outcome::ChannelUnavailable {
            reason: reason.to_string(),
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Outcome::Fulfilled { .. })
    }

    pub fn answer(&self) -> Option<&Answer> {
        match self {
            Outcome::Fulfilled { answer } => Some(answer),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Fulfilled { .. } => "fulfilled",
            Outcome::TimedOut => "timed_out",
            Outcome::Cancelled => "cancelled",
            Outcome::ChannelUnavailable { .. } => "channel_unavailable",
        }
    }
}
