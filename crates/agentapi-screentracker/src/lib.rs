//! Screen tracker and conversation builder.
//!
//! Samples the terminal screen on a fixed cadence, decides when it is
//! stable, extracts agent-authored text by diffing against the screen
//! captured before the last user message, and maintains the ordered
//! conversation history.

mod conversation;
mod message_part;
mod ring_buffer;

pub use conversation::{
    find_new_message, AgentIo, Conversation, ConversationConfig, ConversationStatus,
    FormatMessageFn, SendMessageError,
};
pub use message_part::{execute_parts, parts_to_string, MessagePart};
pub use ring_buffer::RingBuffer;
