//! Per-agent message formatting.
//!
//! Raw agent messages are cut out of a terminal frame, so they carry UI
//! chrome: the agent's input box near the bottom and an echo of the user's
//! own submission near the top. The formatting pipeline strips both and
//! trims the leftover blank lines. Everything here is a pure function of its
//! inputs so it can be exercised against captured screen fixtures.

mod message_box;
mod user_input;

use agentapi_protocol::AgentType;

pub use message_box::extract_codex_reply;
pub use user_input::remove_user_input;

/// The whitespace alphabet shared by the formatter and message validation.
pub const WHITESPACE_CHARS: &[char] = &[' ', '\t', '\n', '\r', '\u{c}', '\u{b}'];

pub fn trim_whitespace(message: &str) -> &str {
    message.trim_matches(WHITESPACE_CHARS)
}

/// Remove leading and trailing lines that are empty or whitespace-only.
/// A message with no content at all is returned unchanged.
pub fn trim_empty_lines(message: &str) -> String {
    let lines: Vec<&str> = message.split('\n').collect();
    let start = lines
        .iter()
        .position(|line| !line.trim_matches(WHITESPACE_CHARS).is_empty())
        .unwrap_or(0);
    let end = lines
        .iter()
        .rposition(|line| !line.trim_matches(WHITESPACE_CHARS).is_empty())
        .unwrap_or(lines.len().saturating_sub(1));
    lines[start..=end].join("\n")
}

fn format_generic_message(message: &str, user_input: &str) -> String {
    let message = remove_user_input(message, user_input);
    let message = message_box::remove_message_box(&message);
    trim_empty_lines(&message)
}

fn format_claude_message(message: &str, user_input: &str) -> String {
    format_generic_message(message, user_input)
}

fn format_goose_message(message: &str, user_input: &str) -> String {
    format_generic_message(message, user_input)
}

fn format_aider_message(message: &str, user_input: &str) -> String {
    format_generic_message(message, user_input)
}

fn format_codex_message(message: &str, user_input: &str) -> String {
    format_generic_message(message, user_input)
}

fn format_gemini_message(message: &str, user_input: &str) -> String {
    format_generic_message(message, user_input)
}

fn format_custom_message(message: &str, user_input: &str) -> String {
    format_generic_message(message, user_input)
}

/// Clean a raw agent message for the given agent type. `user_input` is the
/// last message the user submitted; its echo is removed when found.
pub fn format_agent_message(agent_type: AgentType, message: &str, user_input: &str) -> String {
    match agent_type {
        AgentType::Claude => format_claude_message(message, user_input),
        AgentType::Goose => format_goose_message(message, user_input),
        AgentType::Aider => format_aider_message(message, user_input),
        AgentType::Codex => format_codex_message(message, user_input),
        AgentType::Gemini => format_gemini_message(message, user_input),
        AgentType::Custom => format_custom_message(message, user_input),
    }
}
