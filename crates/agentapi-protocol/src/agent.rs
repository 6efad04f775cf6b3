use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kind of interactive CLI agent running inside the terminal. The type
/// selects the message formatting rules and a couple of terminal quirks
/// (Codex caps the usable terminal height).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Claude,
    Goose,
    Aider,
    Codex,
    Gemini,
    Custom,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid agent type: {0}")]
pub struct UnknownAgentTypeError(pub String);

impl AgentType {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentType::Claude => "claude",
            AgentType::Goose => "goose",
            AgentType::Aider => "aider",
            AgentType::Codex => "codex",
            AgentType::Gemini => "gemini",
            AgentType::Custom => "custom",
        }
    }

    /// Guess the agent type from the program being launched. Unknown programs
    /// run as [`AgentType::Custom`], which uses the generic formatting rules.
    pub fn guess_from_program(program: &str) -> AgentType {
        let name = program
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(program)
            .to_ascii_lowercase();
        AgentType::from_str(&name).unwrap_or(AgentType::Custom)
    }

    /// Resolve the effective agent type from an optional explicit override
    /// and the program name. An explicit value that is not a known agent
    /// type is a configuration error rather than a silent fallback.
    pub fn resolve(
        explicit: Option<&str>,
        program: &str,
    ) -> Result<AgentType, UnknownAgentTypeError> {
        match explicit {
            Some(value) if !value.is_empty() => AgentType::from_str(value),
            _ => Ok(AgentType::guess_from_program(program)),
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentType {
    type Err = UnknownAgentTypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "claude" => Ok(AgentType::Claude),
            "goose" => Ok(AgentType::Goose),
            "aider" => Ok(AgentType::Aider),
            "codex" => Ok(AgentType::Codex),
            "gemini" => Ok(AgentType::Gemini),
            "custom" => Ok(AgentType::Custom),
            other => Err(UnknownAgentTypeError(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_type_serialization_is_stable_for_the_wire() {
        let serialized = serde_json::to_string(&AgentType::Claude).expect("serialize agent type");
        let parsed: AgentType = serde_json::from_str("\"claude\"").expect("parse agent type");

        assert_eq!(serialized, "\"claude\"");
        assert_eq!(parsed, AgentType::Claude);
    }

    #[test]
    fn guesses_agent_type_from_program_path() {
        assert_eq!(AgentType::guess_from_program("claude"), AgentType::Claude);
        assert_eq!(
            AgentType::guess_from_program("/usr/local/bin/goose"),
            AgentType::Goose
        );
        assert_eq!(
            AgentType::guess_from_program("./scripts/echo-agent"),
            AgentType::Custom
        );
    }

    #[test]
    fn explicit_agent_type_overrides_the_program_name() {
        assert_eq!(
            AgentType::resolve(Some("aider"), "claude").expect("resolve explicit type"),
            AgentType::Aider
        );
        assert_eq!(
            AgentType::resolve(None, "codex").expect("resolve guessed type"),
            AgentType::Codex
        );
    }

    #[test]
    fn invalid_explicit_agent_type_is_an_error() {
        let error = AgentType::resolve(Some("clippy"), "claude")
            .expect_err("unknown explicit type should fail");
        assert_eq!(error, UnknownAgentTypeError("clippy".to_owned()));
    }
}
