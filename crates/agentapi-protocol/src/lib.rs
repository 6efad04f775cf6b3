//! Shared vocabulary for the AgentAPI workspace.
//!
//! Everything that crosses a crate boundary more than once lives here: agent
//! types, conversation roles and messages, and the public agent status.

pub mod agent;
pub mod message;

pub use agent::{AgentType, UnknownAgentTypeError};
pub use message::{AgentStatus, ConversationMessage, ConversationRole};
