//! Message encoding for the two request shapes we speak.
//!
//! `openai` keeps system messages inline in the `messages` array.
//! `system_field` lifts them out into a top-level `system` string, each
//! message's content followed by a newline, and sends the rest as is.

use super::types::WireMessage;
use kbchat_application::ModelError;
use kbchat_domain::{Message, Role};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageDialect {
    #[default]
    OpenAi,
    SystemField,
}

impl MessageDialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageDialect::OpenAi => "openai",
            MessageDialect::SystemField => "system_field",
        }
    }

    pub fn valid_values() -> Vec<String> {
        vec!["openai".to_string(), "system_field".to_string()]
    }

    pub fn encode(&self, messages: &[Message]) -> WirePrompt {
        match self {
            MessageDialect::OpenAi => WirePrompt {
                system: None,
                messages: messages.iter().map(to_wire).collect(),
            },
            MessageDialect::SystemField => {
                let mut system = String::new();
                let mut rest = Vec::with_capacity(messages.len());
                for message in messages {
                    if message.role == Role::System {
                        system.push_str(&message.content);
                        system.push('\n');
                    } else {
                        rest.push(to_wire(message));
                    }
                }
                WirePrompt {
                    system: (!system.is_empty()).then_some(system),
                    messages: rest,
                }
            }
        }
    }
}

impl std::fmt::Display for MessageDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MessageDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(MessageDialect::OpenAi),
            "system_field" | "zhipu" => Ok(MessageDialect::SystemField),
            other => Err(format!("unknown message dialect '{}'", other)),
        }
    }
}

/// Encoded prompt, ready to drop into a [`ChatRequest`](super::types::ChatRequest).
#[derive(Debug, Clone, PartialEq)]
pub struct WirePrompt {
    pub system: Option<String>,
    pub messages: Vec<WireMessage>,
}

/// Provider role name for a canonical role.
pub fn wire_role(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::Human => "user",
        Role::Assistant => "assistant",
        Role::Function => "function",
    }
}

/// Parse a role name coming back from the provider.
pub fn parse_role(name: &str) -> Result<Role, ModelError> {
    name.parse::<Role>()
        .map_err(|e| ModelError::InvalidResponse(e.to_string()))
}

fn to_wire(message: &Message) -> WireMessage {
    WireMessage {
        role: wire_role(message.role).to_string(),
        content: message.content.clone(),
        name: message.name.clone(),
    }
}
