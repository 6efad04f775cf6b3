//! Terminal process supervisor.
//!
//! Owns the agent child process attached to an emulated VT100 terminal,
//! drains its output into an in-memory screen buffer, and exposes a
//! tear-free snapshot of the screen alongside keystroke forwarding and
//! lifecycle control.

mod emulator;
mod process;

pub use process::{AgentProcess, AgentProcessConfig, TermError, TermResult};
