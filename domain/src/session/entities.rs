//! Prompt message entities

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Role of a message in a prompt.
///
/// This is the canonical role vocabulary. Provider adapters translate it to
/// their own wire names; role strings coming in from outside are parsed with
/// [`str::parse`] and anything unrecognised is a [`DomainError::UnknownRole`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    Human,
    Assistant,
    Function,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::Human => "human",
            Role::Assistant => "assistant",
            Role::Function => "function",
        }
    }

    /// Label used when rendering a transcript line
    pub fn label(&self) -> &'static str {
        match self {
            Role::System => "System",
            Role::Human => "Human",
            Role::Assistant => "Assistant",
            Role::Function => "Function",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "system" => Ok(Role::System),
            "human" | "user" => Ok(Role::Human),
            "assistant" | "ai" => Ok(Role::Assistant),
            "function" => Ok(Role::Function),
            other => Err(DomainError::UnknownRole(other.to_string())),
        }
    }
}

/// A single message in a prompt (Entity)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Function name, only meaningful for [`Role::Function`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            name: None,
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
            name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            name: None,
        }
    }

    pub fn function(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Function,
            content: content.into(),
            name: Some(name.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_accepts_provider_aliases() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::Human);
        assert_eq!("Human".parse::<Role>().unwrap(), Role::Human);
        assert_eq!("ai".parse::<Role>().unwrap(), Role::Assistant);
        assert_eq!("function".parse::<Role>().unwrap(), Role::Function);
    }

    #[test]
    fn test_role_parse_rejects_unknown() {
        let err = "tool".parse::<Role>().unwrap_err();
        assert_eq!(err, DomainError::UnknownRole("tool".to_string()));
    }

    #[test]
    fn test_function_message_carries_name() {
        let msg = Message::function("lookup", "{}");
        assert_eq!(msg.role, Role::Function);
        assert_eq!(msg.name.as_deref(), Some("lookup"));
    }
}
