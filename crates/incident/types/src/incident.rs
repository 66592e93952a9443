//! Incident records, partial field sets and collection filters.

use crate::ids::{IncidentId, UserId};
use crate::ParseEnumError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Incident severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            other => Err(ParseEnumError::new("severity", other)),
        }
    }
}

/// Incident lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Draft,
    Open,
    InProgress,
    Resolved,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Draft => "DRAFT",
            Status::Open => "OPEN",
            Status::InProgress => "IN_PROGRESS",
            Status::Resolved => "RESOLVED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(Status::Draft),
            "OPEN" => Ok(Status::Open),
            "IN_PROGRESS" => Ok(Status::InProgress),
            "RESOLVED" => Ok(Status::Resolved),
            other => Err(ParseEnumError::new("status", other)),
        }
    }
}

/// Persistent incident record.
///
/// `is_draft` and `status == Draft` always agree; constructors and the
/// lifecycle helpers below are the only places that flip either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: IncidentId,
    pub title: String,
    pub description: Option<String>,
    pub severity: Severity,
    pub status: Status,
    pub is_draft: bool,
    pub creator_id: UserId,
    pub assigned_to_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Incident {
    /// New draft row owned by `creator_id`.
    pub fn new_draft(
        creator_id: UserId,
        title: impl Into<String>,
        assigned_to_id: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: IncidentId::generate(),
            title: title.into(),
            description: None,
            severity: Severity::default(),
            status: Status::Draft,
            is_draft: true,
            creator_id,
            assigned_to_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// New finalized incident. `status` must not be `Draft`.
    pub fn new_finalized(
        creator_id: UserId,
        title: impl Into<String>,
        status: Status,
        assigned_to_id: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Self {
        debug_assert!(status != Status::Draft);
        Self {
            status,
            is_draft: false,
            ..Self::new_draft(creator_id, title, assigned_to_id, now)
        }
    }

    /// Turn a draft into a real incident.
    pub fn finalize(&mut self, status: Status, now: DateTime<Utc>) {
        debug_assert!(status != Status::Draft);
        self.is_draft = false;
        self.status = status;
        self.updated_at = now;
    }

    /// Fields whose values differ between `self` (before) and `after`.
    pub fn diff(&self, after: &Incident) -> Vec<IncidentField> {
        let mut changed = Vec::new();
        if self.title != after.title {
            changed.push(IncidentField::Title);
        }
        if self.description != after.description {
            changed.push(IncidentField::Description);
        }
        if self.severity != after.severity {
            changed.push(IncidentField::Severity);
        }
        if self.status != after.status {
            changed.push(IncidentField::Status);
        }
        if self.is_draft != after.is_draft {
            changed.push(IncidentField::IsDraft);
        }
        if self.assigned_to_id != after.assigned_to_id {
            changed.push(IncidentField::AssignedTo);
        }
        changed
    }

    /// Case-insensitive substring match against title or description.
    /// `needle` must already be lowercased.
    fn mentions(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self
                .description
                .as_deref()
                .map(|d| d.to_lowercase().contains(needle))
                .unwrap_or(false)
    }
}

/// Names of mutable incident fields, used for semantic diffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IncidentField {
    Title,
    Description,
    Severity,
    Status,
    IsDraft,
    AssignedTo,
}

/// Partial incident payload. `None` means "not supplied".
///
/// The nullable columns take a second layer: `Some(None)` is an explicit
/// JSON `null` and clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IncidentFields {
    pub title: Option<String>,
    #[serde(
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    pub severity: Option<Severity>,
    pub status: Option<Status>,
    pub is_draft: Option<bool>,
    #[serde(
        deserialize_with = "explicit_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_to_id: Option<Option<UserId>>,
}

/// A present key, `null` included, becomes `Some`.
fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl IncidentFields {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.severity.is_none()
            && self.status.is_none()
            && self.is_draft.is_none()
            && self.assigned_to_id.is_none()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(Some(description.into()));
        self
    }

    pub fn clear_description(mut self) -> Self {
        self.description = Some(None);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_draft_flag(mut self, is_draft: bool) -> Self {
        self.is_draft = Some(is_draft);
        self
    }

    pub fn with_assignee(mut self, assignee: UserId) -> Self {
        self.assigned_to_id = Some(Some(assignee));
        self
    }

    pub fn unassign(mut self) -> Self {
        self.assigned_to_id = Some(None);
        self
    }
}

/// Caller-supplied collection filters before access scoping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IncidentQuery {
    pub severity: Option<Severity>,
    pub status: Option<Status>,
    /// Creator-or-assignee filter; honoured for admins only.
    pub user_id: Option<UserId>,
    pub search: Option<String>,
}

/// Store-level predicate over incident rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidentFilter {
    pub assigned_to: Option<UserId>,
    pub creator_or_assignee: Option<UserId>,
    pub severity: Option<Severity>,
    pub status: Option<Status>,
    /// Lowercased, trimmed, non-empty search term.
    pub search: Option<String>,
    pub include_drafts: bool,
}

impl IncidentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assigned_to(mut self, user: UserId) -> Self {
        self.assigned_to = Some(user);
        self
    }

    pub fn involving(mut self, user: UserId) -> Self {
        self.creator_or_assignee = Some(user);
        self
    }

    pub fn with_severity(mut self, severity: Option<Severity>) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_status(mut self, status: Option<Status>) -> Self {
        self.status = status;
        self
    }

    /// Blank terms are dropped.
    pub fn with_search(mut self, search: Option<&str>) -> Self {
        self.search = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        self
    }

    pub fn matches(&self, incident: &Incident) -> bool {
        if incident.is_draft && !self.include_drafts {
            return false;
        }
        if let Some(assignee) = self.assigned_to {
            if incident.assigned_to_id != Some(assignee) {
                return false;
            }
        }
        if let Some(user) = self.creator_or_assignee {
            if incident.creator_id != user && incident.assigned_to_id != Some(user) {
                return false;
            }
        }
        if let Some(severity) = self.severity {
            if incident.severity != severity {
                return false;
            }
        }
        if let Some(status) = self.status {
            if incident.status != status {
                return false;
            }
        }
        match &self.search {
            Some(needle) => incident.mentions(needle),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(title: &str, description: Option<&str>) -> Incident {
        let mut incident =
            Incident::new_finalized(UserId::generate(), title, Status::Open, None, Utc::now());
        incident.description = description.map(str::to_string);
        incident
    }

    #[test]
    fn test_draft_constructor_keeps_flag_and_status_in_step() {
        let draft = Incident::new_draft(UserId::generate(), "x", None, Utc::now());
        assert!(draft.is_draft);
        assert_eq!(draft.status, Status::Draft);
        assert_eq!(draft.severity, Severity::Low);
    }

    #[test]
    fn test_finalize_clears_draft() {
        let mut draft = Incident::new_draft(UserId::generate(), "x", None, Utc::now());
        draft.finalize(Status::InProgress, Utc::now());
        assert!(!draft.is_draft);
        assert_eq!(draft.status, Status::InProgress);
    }

    #[test]
    fn test_search_is_case_insensitive_over_title_and_description() {
        let filter = IncidentFilter::new().with_search(Some("  perf "));
        assert!(filter.matches(&sample("Database Performance Issue", None)));
        assert!(filter.matches(&sample("Slow API", Some("PERF regression in v2"))));
        assert!(!filter.matches(&sample("Server Outage", Some("nothing here"))));
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let filter = IncidentFilter::new().with_search(Some("   "));
        assert!(filter.search.is_none());
    }

    #[test]
    fn test_filter_excludes_drafts_by_default() {
        let draft = Incident::new_draft(UserId::generate(), "draft", None, Utc::now());
        assert!(!IncidentFilter::new().matches(&draft));
        let mut with_drafts = IncidentFilter::new();
        with_drafts.include_drafts = true;
        assert!(with_drafts.matches(&draft));
    }

    #[test]
    fn test_involving_matches_creator_or_assignee() {
        let user = UserId::generate();
        let mut created = sample("a", None);
        created.creator_id = user;
        let mut assigned = sample("b", None);
        assigned.assigned_to_id = Some(user);
        let other = sample("c", None);

        let filter = IncidentFilter::new().involving(user);
        assert!(filter.matches(&created));
        assert!(filter.matches(&assigned));
        assert!(!filter.matches(&other));
    }

    #[test]
    fn test_diff_reports_changed_fields_only() {
        let before = sample("a", None);
        let mut after = before.clone();
        after.status = Status::Resolved;
        after.assigned_to_id = Some(UserId::generate());
        assert_eq!(
            before.diff(&after),
            vec![IncidentField::Status, IncidentField::AssignedTo]
        );
        assert!(before.diff(&before).is_empty());
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&Status::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        assert_eq!("in_progress".parse::<Status>().unwrap(), Status::InProgress);
    }

    #[test]
    fn test_fields_deserialize_partial_payload() {
        let fields: IncidentFields =
            serde_json::from_str(r#"{"description":"Y"}"#).unwrap();
        assert_eq!(fields.description, Some(Some("Y".to_string())));
        assert!(fields.title.is_none());
        assert!(fields.assigned_to_id.is_none());
        assert!(!fields.is_empty());
    }

    #[test]
    fn test_fields_null_clears_nullable_columns() {
        let fields: IncidentFields =
            serde_json::from_str(r#"{"description":null,"assignedToId":null}"#).unwrap();
        assert_eq!(fields.description, Some(None));
        assert_eq!(fields.assigned_to_id, Some(None));
        assert!(!fields.is_empty());

        let json = serde_json::to_value(IncidentFields::default().clear_description()).unwrap();
        assert_eq!(json.get("description"), Some(&serde_json::Value::Null));
        assert!(json.get("assignedToId").is_none());
    }
}
