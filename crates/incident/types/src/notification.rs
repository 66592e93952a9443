//! Notification records.

use crate::ids::{IncidentId, NotificationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Notification event type. Unknown types are carried verbatim in `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationType {
    IncidentCreated,
    IncidentAssigned,
    IncidentUpdated,
    Custom(String),
}

impl NotificationType {
    pub fn as_str(&self) -> &str {
        match self {
            NotificationType::IncidentCreated => "INCIDENT_CREATED",
            NotificationType::IncidentAssigned => "INCIDENT_ASSIGNED",
            NotificationType::IncidentUpdated => "INCIDENT_UPDATED",
            NotificationType::Custom(kind) => kind,
        }
    }
}

impl From<String> for NotificationType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "INCIDENT_CREATED" => NotificationType::IncidentCreated,
            "INCIDENT_ASSIGNED" => NotificationType::IncidentAssigned,
            "INCIDENT_UPDATED" => NotificationType::IncidentUpdated,
            _ => NotificationType::Custom(value),
        }
    }
}

impl From<NotificationType> for String {
    fn from(kind: NotificationType) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recipient-addressed notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_id: UserId,
    pub incident_id: Option<IncidentId>,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient_id: UserId,
        kind: NotificationType,
        incident_id: Option<IncidentId>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NotificationId::generate(),
            recipient_id,
            incident_id,
            kind,
            message: message.into(),
            is_read: false,
            created_at: now,
        }
    }
}

/// Recipient-side notification filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationFilter {
    pub is_read: Option<bool>,
}
