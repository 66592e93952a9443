//! Access decisions

use serde::{Deserialize, Serialize};

/// Which kind of access the caller is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// Read, update or audit-view of one specific incident.
    Ownership,
    /// Collection query.
    List,
}

/// Result of evaluating an access policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AccessDecision {
    Allow,
    Deny {
        /// Human-readable reason
        reason: String,
        /// Policy that produced the denial
        policy_id: String,
    },
}

impl AccessDecision {
    pub fn allow() -> Self {
        AccessDecision::Allow
    }

    pub fn deny(reason: impl Into<String>, policy_id: impl Into<String>) -> Self {
        AccessDecision::Deny {
            reason: reason.into(),
            policy_id: policy_id.into(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }

    pub fn is_denied(&self) -> bool {
        !self.is_allowed()
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            AccessDecision::Allow => None,
            AccessDecision::Deny { reason, .. } => Some(reason),
        }
    }
}
