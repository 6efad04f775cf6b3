use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationRole {
    User,
    Agent,
}

/// A single entry in the conversation history. `id` doubles as the message's
/// index in the history; only the last message is ever rewritten in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: usize,
    pub role: ConversationRole,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub time: OffsetDateTime,
}

/// Public agent status reported over the API. The tracker's three-state
/// conversation status collapses onto this: anything that is not `stable`
/// reads as `running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Running,
    Stable,
}

#[cfg(test)]
mod tests {
    use time::format_description::well_known::Rfc3339;

    use super::*;

    #[test]
    fn conversation_message_round_trips_with_rfc3339_time() {
        let message = ConversationMessage {
            id: 2,
            role: ConversationRole::Agent,
            content: "hello".to_owned(),
            time: OffsetDateTime::parse("2024-05-01T12:30:45Z", &Rfc3339).expect("parse time"),
        };

        let serialized = serde_json::to_string(&message).expect("serialize message");
        assert!(serialized.contains("\"2024-05-01T12:30:45Z\""));
        assert!(serialized.contains("\"role\":\"agent\""));

        let deserialized: ConversationMessage =
            serde_json::from_str(&serialized).expect("deserialize message");
        assert_eq!(deserialized, message);
    }

    #[test]
    fn agent_status_serializes_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&AgentStatus::Running).expect("serialize status"),
            "\"running\""
        );
        assert_eq!(
            serde_json::to_string(&AgentStatus::Stable).expect("serialize status"),
            "\"stable\""
        );
    }
}
