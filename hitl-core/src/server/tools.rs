//! MCP tool definitions and result envelopes

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const GET_USER_INPUT: &str = "get_user_input";
pub const GET_USER_CHOICE: &str = "get_user_choice";
pub const GET_MULTILINE_INPUT: &str = "get_multiline_input";
pub const SHOW_CONFIRMATION_DIALOG: &str = "show_confirmation_dialog";
pub const SHOW_INFO_MESSAGE: &str = "show_info_message";
pub const HEALTH_CHECK: &str = "health_check";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments
    pub input_schema: Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        ToolDefinition {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text { text: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        ToolResult {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: None,
        }
    }

    pub fn json<T: Serialize>(value: &T) -> Self {
        let text = serde_json::to_string_pretty(value)
            .unwrap_or_else(|e| json!({ "error": e.to_string() }).to_string());
        ToolResult::text(text)
    }

    pub fn error(message: impl Into<String>) -> Self {
        ToolResult {
            content: vec![ToolContent::Text {
                text: json!({ "success": false, "error": message.into() }).to_string(),
            }],
            is_error: Some(true),
        }
    }

    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    /// First text block, parsed as JSON when possible
    pub fn payload(&self) -> Option<Value> {
        self.content.iter().find_map(|c| match c {
            ToolContent::Text { text } => serde_json::from_str(text).ok(),
        })
    }
}

fn timeout_property() -> Value {
    json!({
        "type": "integer",
        "minimum": 1,
        "description": "Seconds to wait for the human before giving up (defaults to the server's configured timeout)"
    })
}

fn title_property(what: &str) -> Value {
    json!({ "type": "string", "description": format!("Title of the {}", what) })
}

/// Every tool the server exposes
pub fn all_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            GET_USER_INPUT,
            "Ask the user for a single line of text or a number. Use it for specific details, \
             clarifications, paths or values the task needs.",
            json!({
                "type": "object",
                "properties": {
                    "title": title_property("input dialog"),
                    "prompt": { "type": "string", "description": "The question to show to the user" },
                    "default_value": { "type": "string", "description": "Value to pre-fill" },
                    "input_type": {
                        "type": "string",
                        "enum": ["text", "integer", "float"],
                        "default": "text",
                        "description": "Type of input expected"
                    },
                    "timeout_seconds": timeout_property()
                },
                "required": ["title", "prompt"]
            }),
        ),
        ToolDefinition::new(
            GET_USER_CHOICE,
            "Ask the user to pick one (or several) options from a list.",
            json!({
                "type": "object",
                "properties": {
                    "title": title_property("choice dialog"),
                    "prompt": { "type": "string", "description": "The question to show to the user" },
                    "choices": {
                        "type": "array",
                        "items": { "type": "string" },
                        "minItems": 1,
                        "description": "Options to present"
                    },
                    "allow_multiple": {
                        "type": "boolean",
                        "default": false,
                        "description": "Whether several options may be selected"
                    },
                    "timeout_seconds": timeout_property()
                },
                "required": ["title", "prompt", "choices"]
            }),
        ),
        ToolDefinition::new(
            GET_MULTILINE_INPUT,
            "Ask the user for long-form text such as descriptions, code or feedback.",
            json!({
                "type": "object",
                "properties": {
                    "title": title_property("input window"),
                    "prompt": { "type": "string", "description": "The question to show to the user" },
                    "default_value": { "type": "string", "description": "Text to pre-fill" },
                    "timeout_seconds": timeout_property()
                },
                "required": ["title", "prompt"]
            }),
        ),
        ToolDefinition::new(
            SHOW_CONFIRMATION_DIALOG,
            "Ask the user a yes/no question. Use it before destructive or irreversible actions.",
            json!({
                "type": "object",
                "properties": {
                    "title": title_property("confirmation dialog"),
                    "message": { "type": "string", "description": "What the user is confirming" },
                    "timeout_seconds": timeout_property()
                },
                "required": ["title", "message"]
            }),
        ),
        ToolDefinition::new(
            SHOW_INFO_MESSAGE,
            "Show the user a status update or notification. No answer is collected.",
            json!({
                "type": "object",
                "properties": {
                    "title": title_property("message"),
                    "message": { "type": "string", "description": "Text to show" },
                    "timeout_seconds": timeout_property()
                },
                "required": ["title", "message"]
            }),
        ),
        ToolDefinition::new(
            HEALTH_CHECK,
            "Report which channels can currently reach the user.",
            json!({ "type": "object", "properties": {} }),
        ),
    ]
}

pub fn get_tool(name: &str) -> Option<ToolDefinition> {
    all_tools().into_iter().find(|t| t.name == name)
}

pub fn tool_names() -> Vec<String> {
    all_tools().into_iter().map(|t| t.name).collect()
}
