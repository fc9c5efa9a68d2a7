//! Invocation policy for overlapping sends

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How an orchestrator treats a `send` that arrives while another is
/// still in flight on the same instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationPolicy {
    /// Wait for the running invocation to finish.
    #[default]
    Serialize,
    /// Fail immediately with a concurrent-invocation error.
    Reject,
}

impl InvocationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationPolicy::Serialize => "serialize",
            InvocationPolicy::Reject => "reject",
        }
    }
}

impl std::fmt::Display for InvocationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for InvocationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "serialize" | "wait" => Ok(InvocationPolicy::Serialize),
            "reject" => Ok(InvocationPolicy::Reject),
            other => Err(format!(
                "invalid invocation policy '{}', expected one of: serialize, reject",
                other
            )),
        }
    }
}
