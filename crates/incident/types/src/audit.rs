//! Audit log records.

use crate::ids::{AuditEntryId, IncidentId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Audit action. Unknown actions are carried verbatim in `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuditAction {
    Created,
    Updated,
    Assigned,
    Deleted,
    StatusChanged,
    Custom(String),
}

impl AuditAction {
    pub fn as_str(&self) -> &str {
        match self {
            AuditAction::Created => "CREATED",
            AuditAction::Updated => "UPDATED",
            AuditAction::Assigned => "ASSIGNED",
            AuditAction::Deleted => "DELETED",
            AuditAction::StatusChanged => "STATUS_CHANGED",
            AuditAction::Custom(action) => action,
        }
    }
}

impl From<String> for AuditAction {
    fn from(value: String) -> Self {
        match value.as_str() {
            "CREATED" => AuditAction::Created,
            "UPDATED" => AuditAction::Updated,
            "ASSIGNED" => AuditAction::Assigned,
            "DELETED" => AuditAction::Deleted,
            "STATUS_CHANGED" => AuditAction::StatusChanged,
            _ => AuditAction::Custom(value),
        }
    }
}

impl From<AuditAction> for String {
    fn from(action: AuditAction) -> Self {
        action.as_str().to_string()
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit append payload. Identifier and timestamp are assigned by storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditAppend {
    pub incident_id: IncidentId,
    pub actor_id: UserId,
    pub action: AuditAction,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

/// Immutable audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: AuditEntryId,
    /// Insertion order; breaks `created_at` ties when listing.
    pub sequence: u64,
    pub incident_id: IncidentId,
    pub actor_id: UserId,
    pub action: AuditAction,
    pub before_snapshot: Option<Value>,
    pub after_snapshot: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// Admin-side audit filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuditFilter {
    pub incident_id: Option<IncidentId>,
    pub actor_id: Option<UserId>,
}

impl AuditFilter {
    pub fn for_incident(incident_id: IncidentId) -> Self {
        Self {
            incident_id: Some(incident_id),
            actor_id: None,
        }
    }

    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        self.incident_id.map_or(true, |id| entry.incident_id == id)
            && self.actor_id.map_or(true, |id| entry.actor_id == id)
    }
}
