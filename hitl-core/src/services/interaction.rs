//! Human interaction handling: tool arguments in, bridge requests out, result payloads back

use crate::bridge::{BridgeCoordinator, Resolution};
use crate::models::{timeout_from_seconds, Answer, InputType, Outcome, Prompt, PromptKind};
use crate::server::tools::{self, ToolResult};
use crate::server::ToolHandler;
use crate::services::logging;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize)]
struct InputArgs {
    #[serde(default)]
    title: Option<String>,
    prompt: String,
    #[serde(default)]
    default_value: Option<String>,
    #[serde(default)]
    input_type: InputType,
    #[serde(default)]
    timeout_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ChoiceArgs {
    #[serde(default)]
    title: Option<String>,
    prompt: String,
    choices: Vec<String>,
    #[serde(default)]
    allow_multiple: bool,
    #[serde(default)]
    timeout_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct MultilineArgs {
    #[serde(default)]
    title: Option<String>,
    prompt: String,
    #[serde(default)]
    default_value: Option<String>,
    #[serde(default)]
    timeout_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct MessageArgs {
    #[serde(default)]
    title: Option<String>,
    message: String,
    #[serde(default)]
    timeout_seconds: Option<i64>,
}

/// Handles MCP tool calls by asking the human through the bridge
pub struct InteractionService {
    bridge: Arc<BridgeCoordinator>,
    default_title: String,
}

impl InteractionService {
    pub fn new(bridge: Arc<BridgeCoordinator>, default_title: impl Into<String>) -> Self {
        Self {
            bridge,
            default_title: default_title.into(),
        }
    }

    pub fn bridge(&self) -> &BridgeCoordinator {
        &self.bridge
    }

    /// Turn a tool call into a prompt plus optional timeout override
    fn prompt_for(
        &self,
        tool: &str,
        arguments: Value,
    ) -> Result<(Prompt, Option<Duration>), String> {
        let (title, text, kind, timeout) = match tool {
            tools::GET_USER_INPUT => {
                let args: InputArgs = parse_args(tool, arguments)?;
                let kind = PromptKind::Text {
                    default_value: args.default_value,
                    input_type: args.input_type,
                };
                (args.title, args.prompt, kind, args.timeout_seconds)
            }
            tools::GET_USER_CHOICE => {
                let args: ChoiceArgs = parse_args(tool, arguments)?;
                let kind = PromptKind::Choice {
                    choices: args.choices,
                    allow_multiple: args.allow_multiple,
                };
                (args.title, args.prompt, kind, args.timeout_seconds)
            }
            tools::GET_MULTILINE_INPUT => {
                let args: MultilineArgs = parse_args(tool, arguments)?;
                let kind = PromptKind::Multiline {
                    default_value: args.default_value,
                };
                (args.title, args.prompt, kind, args.timeout_seconds)
            }
            tools::SHOW_CONFIRMATION_DIALOG | tools::SHOW_INFO_MESSAGE => {
                let args: MessageArgs = parse_args(tool, arguments)?;
                let kind = if tool == tools::SHOW_INFO_MESSAGE {
                    PromptKind::Info
                } else {
                    PromptKind::Confirmation
                };
                (args.title, args.message, kind, args.timeout_seconds)
            }
            other => return Err(format!("Unknown tool: {}", other)),
        };

        let timeout = timeout
            .map(timeout_from_seconds)
            .transpose()
            .map_err(|e| e.to_string())?;
        let title = title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| self.default_title.clone());
        Ok((Prompt::new(title, text, kind), timeout))
    }

    /// Ask the human on behalf of `tool`
    pub async fn ask(&self, tool: &str, arguments: Value, cancel: &CancellationToken) -> ToolResult {
        let (prompt, timeout) = match self.prompt_for(tool, arguments) {
            Ok(parsed) => parsed,
            Err(message) => return ToolResult::error(message),
        };
        logging::log_interaction("tool_called", None, None, Some(tool));

        let kind = prompt.kind.clone();
        match self.bridge.request(prompt, timeout, cancel).await {
            Ok(resolution) => ToolResult::json(&result_payload(&kind, &resolution)),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }

    pub async fn health(&self) -> Value {
        let mut report = self.bridge.health().await;
        report.tools_available = tools::tool_names();
        serde_json::to_value(&report).unwrap_or_else(|e| json!({ "error": e.to_string() }))
    }
}

#[async_trait]
impl ToolHandler for InteractionService {
    async fn call(&self, name: &str, arguments: Value, cancel: CancellationToken) -> ToolResult {
        if name == tools::HEALTH_CHECK {
            return ToolResult::json(&self.health().await);
        }
        self.ask(name, arguments, &cancel).await
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, String> {
    serde_json::from_value(arguments).map_err(|e| format!("Invalid arguments for {}: {}", tool, e))
}

fn answer_value(answer: &Answer) -> Value {
    match answer {
        Answer::Integer(n) => json!(n),
        Answer::Float(f) => json!(f),
        other => other.as_text().map(Value::String).unwrap_or(Value::Null),
    }
}

/// JSON result for one resolved request, shaped by the prompt kind.
///
/// `success` is true only when the human gave an answer of the expected shape. Replies that do
/// not fit come back in `user_input` so the agent can still read them.
pub fn result_payload(kind: &PromptKind, resolution: &Resolution) -> Value {
    let mut out = Map::new();
    let outcome = &resolution.outcome;
    let dismissed = matches!(outcome.answer(), Some(Answer::Dismissed));
    let mut success = outcome.is_fulfilled() && !dismissed;
    let mut error = match outcome {
        Outcome::Fulfilled { .. } if dismissed => Some("Dismissed by the user".to_string()),
        Outcome::Fulfilled { .. } => None,
        Outcome::TimedOut => Some("Timed out waiting for a response".to_string()),
        Outcome::Cancelled => Some("Request was cancelled".to_string()),
        Outcome::ChannelUnavailable { reason } => Some(format!("No channel available: {}", reason)),
    };

    let answer = outcome.answer().filter(|_| !dismissed);
    match kind {
        PromptKind::Text { input_type, .. } => {
            out.insert("user_input".into(), answer.map(answer_value).unwrap_or(Value::Null));
            out.insert("input_type".into(), json!(input_type.as_str()));
            if *input_type != InputType::Text {
                if let Some(Answer::Text(_)) = answer {
                    success = false;
                    error = Some(format!("Reply is not a valid {}", input_type.as_str()));
                }
            }
        }
        PromptKind::Multiline { .. } => {
            let text = answer.and_then(Answer::as_text);
            out.insert("user_input".into(), json!(text));
            if let Some(text) = &text {
                out.insert("character_count".into(), json!(text.chars().count()));
                out.insert("line_count".into(), json!(text.split('\n').count()));
            }
        }
        PromptKind::Choice { allow_multiple, .. } => match answer {
            Some(Answer::Choices(selected)) => {
                let first = if *allow_multiple {
                    json!(selected)
                } else {
                    json!(selected.first())
                };
                out.insert("selected_choice".into(), first);
                out.insert("selected_choices".into(), json!(selected));
            }
            other => {
                out.insert("selected_choice".into(), Value::Null);
                out.insert("selected_choices".into(), json!([]));
                if let Some(Answer::Text(raw)) = other {
                    out.insert("user_input".into(), json!(raw));
                    success = false;
                    error = Some("Reply did not match any of the choices".to_string());
                }
            }
        },
        PromptKind::Confirmation => match answer {
            Some(Answer::Confirmed(confirmed)) => {
                out.insert("confirmed".into(), json!(confirmed));
                out.insert("response".into(), json!(if *confirmed { "yes" } else { "no" }));
            }
            other => {
                out.insert("confirmed".into(), json!(false));
                if let Some(Answer::Text(raw)) = other {
                    out.insert("user_input".into(), json!(raw));
                    success = false;
                    error = Some("Reply was not a yes/no answer".to_string());
                }
            }
        },
        PromptKind::Info => {
            out.insert(
                "acknowledged".into(),
                json!(matches!(answer, Some(Answer::Acknowledged))),
            );
        }
    }

    out.insert("success".into(), json!(success));
    out.insert(
        "cancelled".into(),
        json!(dismissed || matches!(outcome, Outcome::Cancelled)),
    );
    out.insert("timed_out".into(), json!(matches!(outcome, Outcome::TimedOut)));
    out.insert("status".into(), json!(outcome.label()));
    out.insert(
        "transport".into(),
        json!(resolution.channel.map(|c| c.as_str())),
    );
    out.insert("platform".into(), json!(std::env::consts::OS));
    out.insert("request_id".into(), json!(resolution.request_id.to_string()));
    out.insert(
        "elapsed_seconds".into(),
        json!(resolution.elapsed.as_secs_f64()),
    );
    if let Some(error) = error {
        out.insert("error".into(), json!(error));
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelKind;
    use uuid::Uuid;

    fn resolved(outcome: Outcome, channel: Option<ChannelKind>) -> Resolution {
        Resolution {
            request_id: Uuid::new_v4(),
            channel,
            outcome,
            elapsed: Duration::from_millis(1500),
        }
    }

    fn service() -> InteractionService {
        let bridge = BridgeCoordinator::new(None, None, Duration::from_secs(60));
        InteractionService::new(Arc::new(bridge), "Human-in-the-Loop")
    }

    #[test]
    fn test_choice_payload() {
        let kind = PromptKind::Choice {
            choices: vec!["red".into(), "blue".into()],
            allow_multiple: false,
        };
        let payload = result_payload(
            &kind,
            &resolved(
                Outcome::fulfilled(Answer::Choices(vec!["blue".into()])),
                Some(ChannelKind::RemoteRelay),
            ),
        );
        assert_eq!(payload["success"], true);
        assert_eq!(payload["selected_choice"], "blue");
        assert_eq!(payload["selected_choices"], json!(["blue"]));
        assert_eq!(payload["transport"], "telegram");
        assert!(payload.get("error").is_none());
    }

    #[test]
    fn test_unmatched_choice_keeps_raw_reply() {
        let kind = PromptKind::Choice {
            choices: vec!["red".into()],
            allow_multiple: false,
        };
        let payload = result_payload(
            &kind,
            &resolved(
                Outcome::fulfilled(Answer::Text("purple please".into())),
                Some(ChannelKind::RemoteRelay),
            ),
        );
        assert_eq!(payload["success"], false);
        assert_eq!(payload["user_input"], "purple please");
        assert_eq!(payload["selected_choice"], Value::Null);
    }

    #[test]
    fn test_multiline_counts() {
        let kind = PromptKind::Multiline {
            default_value: None,
        };
        let payload = result_payload(
            &kind,
            &resolved(
                Outcome::fulfilled(Answer::Text("one\ntwo\nthree".into())),
                Some(ChannelKind::LocalDialog),
            ),
        );
        assert_eq!(payload["character_count"], 13);
        assert_eq!(payload["line_count"], 3);
        assert_eq!(payload["transport"], "dialog");
    }

    #[test]
    fn test_timeout_and_dismissal_payloads() {
        let kind = PromptKind::Confirmation;
        let timed_out = result_payload(&kind, &resolved(Outcome::TimedOut, None));
        assert_eq!(timed_out["success"], false);
        assert_eq!(timed_out["timed_out"], true);
        assert_eq!(timed_out["cancelled"], false);
        assert_eq!(timed_out["transport"], Value::Null);
        assert_eq!(timed_out["confirmed"], false);

        let text = PromptKind::Text {
            default_value: None,
            input_type: InputType::Text,
        };
        let dismissed = result_payload(
            &text,
            &resolved(
                Outcome::fulfilled(Answer::Dismissed),
                Some(ChannelKind::LocalDialog),
            ),
        );
        assert_eq!(dismissed["success"], false);
        assert_eq!(dismissed["cancelled"], true);
        assert_eq!(dismissed["user_input"], Value::Null);
    }

    #[test]
    fn test_numeric_input_payload() {
        let kind = PromptKind::Text {
            default_value: None,
            input_type: InputType::Integer,
        };
        let ok = result_payload(
            &kind,
            &resolved(Outcome::fulfilled(Answer::Integer(8)), Some(ChannelKind::RemoteRelay)),
        );
        assert_eq!(ok["user_input"], 8);
        assert_eq!(ok["input_type"], "integer");

        let bad = result_payload(
            &kind,
            &resolved(
                Outcome::fulfilled(Answer::Text("eight".into())),
                Some(ChannelKind::RemoteRelay),
            ),
        );
        assert_eq!(bad["success"], false);
        assert_eq!(bad["user_input"], "eight");
    }

    #[test]
    fn test_prompt_for_tools() {
        let service = service();
        let (prompt, timeout) = service
            .prompt_for(
                tools::GET_USER_CHOICE,
                json!({ "title": "", "prompt": "Pick", "choices": ["a", "b"], "timeout_seconds": 30 }),
            )
            .unwrap();
        assert_eq!(prompt.title, "Human-in-the-Loop");
        assert_eq!(timeout, Some(Duration::from_secs(30)));
        assert!(matches!(prompt.kind, PromptKind::Choice { .. }));

        let (prompt, timeout) = service
            .prompt_for(
                tools::SHOW_INFO_MESSAGE,
                json!({ "title": "Build", "message": "Done" }),
            )
            .unwrap();
        assert_eq!(prompt.kind, PromptKind::Info);
        assert_eq!(prompt.text, "Done");
        assert!(timeout.is_none());
    }

    #[test]
    fn test_prompt_for_rejects_bad_arguments() {
        let service = service();
        assert!(service
            .prompt_for(tools::GET_USER_CHOICE, json!({ "prompt": "Pick" }))
            .is_err());
        assert!(service
            .prompt_for(
                tools::GET_USER_INPUT,
                json!({ "prompt": "Name?", "timeout_seconds": 0 })
            )
            .is_err());
    }

    #[tokio::test]
    async fn test_validation_error_is_tool_error() {
        let service = service();
        let result = service
            .call(
                tools::GET_USER_INPUT,
                json!({ "title": "t", "prompt": "   " }),
                CancellationToken::new(),
            )
            .await;
        assert!(result.is_error());
    }
}
