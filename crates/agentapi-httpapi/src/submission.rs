use agentapi_protocol::AgentType;
use agentapi_screentracker::MessagePart;

/// Bracketed paste keeps multi-line input from being submitted line by line.
const BRACKETED_PASTE_START: &str = "\x1b[200~";
const BRACKETED_PASTE_END: &str = "\x1b[201~";

fn paste_parts(message: &str) -> Vec<MessagePart> {
    vec![
        MessagePart::hidden_text(BRACKETED_PASTE_START),
        MessagePart::text(message),
        MessagePart::hidden_text(BRACKETED_PASTE_END),
    ]
}

fn claude_code_message_parts(message: &str) -> Vec<MessagePart> {
    let mut parts = Vec::new();
    // Type-and-erase a throwaway character first; without it Claude Code
    // echoes the paste start sequence back into the terminal.
    parts.push(MessagePart::hidden_text("x\u{8}"));
    parts.extend(paste_parts(message));
    // The submitting carriage return is not part of the encoding: the
    // tracker delivers it once the echo has landed, and re-sends it if the
    // agent drops it.
    parts
}

/// Encode a user message as the part sequence to type into the agent's
/// terminal. The content is passed through as-is; padded submissions are
/// rejected by the conversation's validation. The Claude Code encoding works
/// for every supported agent.
pub fn user_message_parts(_agent_type: AgentType, message: &str) -> Vec<MessagePart> {
    claude_code_message_parts(message)
}

#[cfg(test)]
mod tests {
    use agentapi_screentracker::parts_to_string;

    use super::*;

    #[test]
    fn visible_content_is_exactly_the_message() {
        let parts = user_message_parts(AgentType::Claude, "hello world");
        assert_eq!(parts_to_string(&parts), "hello world");
    }

    #[test]
    fn submission_is_wrapped_in_bracketed_paste() {
        let parts = user_message_parts(AgentType::Custom, "hi");
        assert_eq!(
            parts,
            vec![
                MessagePart::hidden_text("x\u{8}"),
                MessagePart::hidden_text(BRACKETED_PASTE_START),
                MessagePart::text("hi"),
                MessagePart::hidden_text(BRACKETED_PASTE_END),
            ]
        );
    }
}
