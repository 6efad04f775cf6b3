use agentapi_msgfmt::WHITESPACE_CHARS;
use agentapi_protocol::{AgentStatus, ConversationMessage};
use agentapi_screentracker::ConversationStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChangeBody {
    pub status: AgentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenUpdateBody {
    pub screen: String,
}

/// A typed event fanned out to SSE subscribers. The variant picks both the
/// SSE `event:` name and the JSON payload shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    MessageUpdate(ConversationMessage),
    StatusChange(StatusChangeBody),
    ScreenUpdate(ScreenUpdateBody),
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::MessageUpdate(_) => "message_update",
            Event::StatusChange(_) => "status_change",
            Event::ScreenUpdate(_) => "screen_update",
        }
    }

    pub fn payload_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Event::MessageUpdate(body) => serde_json::to_string(body),
            Event::StatusChange(body) => serde_json::to_string(body),
            Event::ScreenUpdate(body) => serde_json::to_string(body),
        }
    }
}

/// Collapse the tracker's three-state status onto the public two-state one.
pub fn convert_status(status: ConversationStatus) -> AgentStatus {
    match status {
        ConversationStatus::Initializing | ConversationStatus::Changing => AgentStatus::Running,
        ConversationStatus::Stable => AgentStatus::Stable,
    }
}

/// Screens are padded to the terminal grid; the trailing whitespace is noise
/// on the wire.
pub fn trim_screen_for_wire(screen: &str) -> String {
    screen.trim_end_matches(WHITESPACE_CHARS).to_owned()
}

#[cfg(test)]
mod tests {
    use agentapi_protocol::ConversationRole;
    use time::OffsetDateTime;

    use super::*;

    #[test]
    fn event_kinds_match_the_sse_event_names() {
        let message = Event::MessageUpdate(ConversationMessage {
            id: 0,
            role: ConversationRole::Agent,
            content: "hi".to_owned(),
            time: OffsetDateTime::UNIX_EPOCH,
        });
        assert_eq!(message.kind(), "message_update");
        assert_eq!(
            Event::StatusChange(StatusChangeBody {
                status: AgentStatus::Stable,
            })
            .kind(),
            "status_change"
        );
        assert_eq!(
            Event::ScreenUpdate(ScreenUpdateBody {
                screen: String::new(),
            })
            .kind(),
            "screen_update"
        );
    }

    #[test]
    fn message_update_payload_uses_wire_field_names() {
        let event = Event::MessageUpdate(ConversationMessage {
            id: 3,
            role: ConversationRole::User,
            content: "hello".to_owned(),
            time: OffsetDateTime::UNIX_EPOCH,
        });
        let payload = event.payload_json().expect("serialize payload");
        assert!(payload.contains("\"id\":3"));
        assert!(payload.contains("\"role\":\"user\""));
        assert!(payload.contains("\"content\":\"hello\""));
        assert!(payload.contains("\"time\":\"1970-01-01T00:00:00Z\""));
    }

    #[test]
    fn status_conversion_collapses_to_running_or_stable() {
        assert_eq!(
            convert_status(ConversationStatus::Initializing),
            AgentStatus::Running
        );
        assert_eq!(
            convert_status(ConversationStatus::Changing),
            AgentStatus::Running
        );
        assert_eq!(
            convert_status(ConversationStatus::Stable),
            AgentStatus::Stable
        );
    }

    #[test]
    fn screens_are_trimmed_of_trailing_whitespace_for_the_wire() {
        assert_eq!(trim_screen_for_wire("hello   \n \t \n"), "hello");
        assert_eq!(trim_screen_for_wire("  lead stays"), "  lead stays");
    }
}
