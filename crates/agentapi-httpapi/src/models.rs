use agentapi_protocol::{AgentStatus, ConversationMessage};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// A conversational message: validated, confirmed, and recorded.
    User,
    /// Raw keystrokes forwarded to the terminal without validation and
    /// without touching the conversation history.
    Raw,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageRequest {
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: AgentStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<ConversationMessage>,
}

/// Error envelope returned by every failing endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                detail: self.detail,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_request_parses_both_types() {
        let user: MessageRequest =
            serde_json::from_str(r#"{"content":"hi","type":"user"}"#).expect("parse user request");
        assert_eq!(user.message_type, MessageType::User);

        let raw: MessageRequest = serde_json::from_str(r#"{"content":"\u001b[A","type":"raw"}"#)
            .expect("parse raw request");
        assert_eq!(raw.message_type, MessageType::Raw);
        assert_eq!(raw.content, "\u{1b}[A");
    }

    #[test]
    fn unknown_message_types_fail_to_parse() {
        assert!(serde_json::from_str::<MessageRequest>(r#"{"content":"hi","type":"shout"}"#).is_err());
    }
}
