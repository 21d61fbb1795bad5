//! The `get_human_loop_prompt` MCP prompt: when and how an agent should use the tools

use serde_json::{json, Value};

pub const HUMAN_LOOP_PROMPT: &str = "get_human_loop_prompt";

const MAIN_GUIDANCE: &str = "\
You can reach the user directly through Human-in-the-Loop tools. The question goes to the \
user's phone (Telegram) when a responder is configured, otherwise to a dialog on their screen. \
Every call blocks until the user answers, the timeout passes, or the call is cancelled.

WHEN TO ASK:
1. Ambiguous requirements: instructions that allow several interpretations
2. Decision points: the user has to pick between valid alternatives
3. Sensitive operations: before destructive or irreversible actions
4. Missing information: details the original request did not provide
5. Quality feedback: validation of intermediate results before going on

TOOLS:
- get_user_input: one line of text or a number (names, values, paths)
- get_user_choice: pick from a list of options
- get_multiline_input: long-form text (descriptions, code, feedback)
- show_confirmation_dialog: yes/no decisions
- show_info_message: status updates, no answer collected
- health_check: which channels can reach the user right now";

const DECISION_FRAMEWORK: &str = "\
ASK YOURSELF:
1. Is this decision a matter of preference? Use get_user_choice.
2. Do I need information I was not given? Use get_user_input.
3. Could this action cause damage if wrong? Use show_confirmation_dialog.
4. Is this a long process the user should know about? Use show_info_message.
5. Do I need a detailed explanation? Use get_multiline_input.

AVOID OVERUSE:
- Don't ask for information already provided
- Don't confirm obviously safe operations
- Ask one comprehensive question instead of several small ones";

const RESULT_HANDLING: &str = "\
Every result carries success, cancelled and timed_out flags.
- success=false, timed_out=true: nobody answered in time. Fall back to a safe default or stop.
- success=false, cancelled=true: the user dismissed the question or the call was withdrawn. \
Do not retry the same question immediately.
- A reply that did not match the expected shape comes back in user_input with success=false. \
Read it: the user may have written something useful.
- Pass timeout_seconds for questions that should not block for the full default.";

/// Entry for `prompts/list`
pub fn prompt_descriptor() -> Value {
    json!({
        "name": HUMAN_LOOP_PROMPT,
        "description": "Guidance on when and how to ask the user through the human-in-the-loop tools",
        "arguments": []
    })
}

/// Result for `prompts/get`
pub fn prompt_messages() -> Value {
    let text = format!("{}\n\n{}\n\n{}", MAIN_GUIDANCE, DECISION_FRAMEWORK, RESULT_HANDLING);
    json!({
        "description": "Human-in-the-loop usage guidance",
        "messages": [{
            "role": "user",
            "content": { "type": "text", "text": text }
        }]
    })
}
