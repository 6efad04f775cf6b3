use std::time::Duration;

use crate::conversation::AgentIo;

/// One piece of a user submission. Text parts are written to the terminal as
/// bytes; wait parts pause between writes. Only the visible rendering of a
/// part contributes to the recorded user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePart {
    Text {
        content: String,
        /// Recorded in place of `content` when set.
        alias: Option<String>,
        /// Hidden parts (control sequences, primers) render as nothing.
        hidden: bool,
    },
    Wait {
        duration: Duration,
    },
}

impl MessagePart {
    pub fn text(content: impl Into<String>) -> Self {
        MessagePart::Text {
            content: content.into(),
            alias: None,
            hidden: false,
        }
    }

    pub fn hidden_text(content: impl Into<String>) -> Self {
        MessagePart::Text {
            content: content.into(),
            alias: None,
            hidden: true,
        }
    }

    pub fn wait(duration: Duration) -> Self {
        MessagePart::Wait { duration }
    }

    fn visible_text(&self) -> &str {
        match self {
            MessagePart::Text { hidden: true, .. } | MessagePart::Wait { .. } => "",
            MessagePart::Text {
                alias: Some(alias), ..
            } => alias,
            MessagePart::Text { content, .. } => content,
        }
    }
}

/// The user-visible rendering of a submission: the concatenation of all
/// non-hidden text parts (aliases standing in where present).
pub fn parts_to_string(parts: &[MessagePart]) -> String {
    parts.iter().map(MessagePart::visible_text).collect()
}

/// Perform each part in order: write text to the agent, sleep on waits.
pub async fn execute_parts(
    agent_io: &dyn AgentIo,
    parts: &[MessagePart],
) -> std::io::Result<()> {
    for part in parts {
        match part {
            MessagePart::Text { content, .. } => {
                agent_io.write(content.as_bytes()).await?;
            }
            MessagePart::Wait { duration } => {
                tokio::time::sleep(*duration).await;
            }
        }
    }
    Ok(())
}
