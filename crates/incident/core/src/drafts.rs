//! Per-creator draft reconciliation.
//!
//! Every "save" from a caller is resolved against that caller's single draft
//! row: it creates the draft, merges into it, or promotes it to a real
//! incident. Direct creation without a draft is handled here as well so the
//! service has one entry point for both paths.

use crate::error::{IncidentError, Result};
use chrono::{DateTime, Utc};
use incident_storage::{IncidentStore, StorageError};
use incident_types::{CallerContext, Incident, IncidentFields, IncidentId, Status, UserId};
use std::sync::Arc;
use tracing::{debug, info};

/// What a save did to the caller's draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A new draft row was inserted.
    DraftCreated(Incident),
    /// The existing draft was merged into (possibly with nothing to change).
    DraftUpdated(Incident),
    /// A real incident now exists. `promoted_from` holds the draft it replaced,
    /// if any.
    Finalized {
        incident: Incident,
        promoted_from: Option<Incident>,
    },
}

impl SaveOutcome {
    pub fn incident(&self) -> &Incident {
        match self {
            SaveOutcome::DraftCreated(incident) | SaveOutcome::DraftUpdated(incident) => incident,
            SaveOutcome::Finalized { incident, .. } => incident,
        }
    }

    pub fn into_incident(self) -> Incident {
        match self {
            SaveOutcome::DraftCreated(incident) | SaveOutcome::DraftUpdated(incident) => incident,
            SaveOutcome::Finalized { incident, .. } => incident,
        }
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self, SaveOutcome::Finalized { .. })
    }
}

/// Status a finalize path settles on. DRAFT is not a finalized status.
pub(crate) fn finalized_status(requested: Option<Status>) -> Result<Status> {
    match requested {
        None => Ok(Status::Open),
        Some(Status::Draft) => Err(IncidentError::bad_request(
            "cannot finalize an incident into DRAFT status",
        )),
        Some(status) => Ok(status),
    }
}

/// Trimmed title, or `BadRequest` when blank.
pub(crate) fn required_title(title: Option<&str>) -> Result<String> {
    match title.map(str::trim) {
        Some(title) if !title.is_empty() => Ok(title.to_string()),
        _ => Err(IncidentError::bad_request("title is required")),
    }
}

/// Reject a supplied-but-blank title.
pub(crate) fn check_title(title: Option<&str>) -> Result<()> {
    match title {
        Some(title) if title.trim().is_empty() => {
            Err(IncidentError::bad_request("title must not be empty"))
        }
        _ => Ok(()),
    }
}

/// Creates, merges into, or promotes the caller's single draft.
#[derive(Clone)]
pub struct DraftReconciler {
    incidents: Arc<dyn IncidentStore>,
}

impl DraftReconciler {
    pub fn new(incidents: Arc<dyn IncidentStore>) -> Self {
        Self { incidents }
    }

    /// Resolve one save against the caller's draft.
    ///
    /// A concurrent save that inserted the caller's draft first is merged
    /// into rather than duplicated. A concurrent finalize of the same draft
    /// fails the loser with `Conflict`.
    pub async fn reconcile_save(
        &self,
        caller: &CallerContext,
        fields: IncidentFields,
        finalize: bool,
    ) -> Result<SaveOutcome> {
        check_title(fields.title.as_deref())?;
        let status = if finalize {
            Some(finalized_status(fields.status)?)
        } else {
            None
        };

        for attempt in 0..2 {
            let now = Utc::now();
            if let Some(draft) = self.incidents.find_draft(&caller.id).await? {
                return match status {
                    Some(status) => self.promote(caller, draft, &fields, status, now).await,
                    None => self.merge(caller, draft, &fields, now).await,
                };
            }

            let title = required_title(fields.title.as_deref())?;
            let assignee = if caller.is_admin() {
                fields.assigned_to_id.flatten()
            } else {
                Some(caller.id)
            };

            let mut incident = match status {
                Some(status) => Incident::new_finalized(caller.id, title, status, assignee, now),
                None => Incident::new_draft(caller.id, title, assignee, now),
            };
            incident.description = fields.description.clone().flatten();
            if let Some(severity) = fields.severity {
                incident.severity = severity;
            }

            match self.incidents.insert_incident(incident.clone()).await {
                Ok(()) if incident.is_draft => {
                    debug!(incident_id = %incident.id, creator = %caller.id, "draft created");
                    return Ok(SaveOutcome::DraftCreated(incident));
                }
                Ok(()) => {
                    info!(incident_id = %incident.id, creator = %caller.id, "incident created");
                    return Ok(SaveOutcome::Finalized {
                        incident,
                        promoted_from: None,
                    });
                }
                Err(StorageError::Conflict(reason)) if incident.is_draft && attempt == 0 => {
                    debug!(creator = %caller.id, reason = %reason, "draft inserted concurrently; merging");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(IncidentError::Conflict(
            "draft changed concurrently; retry the save".to_string(),
        ))
    }

    /// Autosave: merge into the draft, or start one.
    pub async fn autosave(&self, caller: &CallerContext, fields: IncidentFields) -> Result<Incident> {
        self.reconcile_save(caller, fields, false)
            .await
            .map(SaveOutcome::into_incident)
    }

    pub async fn get_draft(&self, creator_id: UserId) -> Result<Option<Incident>> {
        Ok(self.incidents.find_draft(&creator_id).await?)
    }

    /// Idempotent. Returns the id of the removed draft, if there was one.
    pub async fn delete_draft(&self, creator_id: UserId) -> Result<Option<IncidentId>> {
        let Some(draft) = self.incidents.find_draft(&creator_id).await? else {
            return Ok(None);
        };
        if self.incidents.delete_incident(&draft.id).await? {
            debug!(incident_id = %draft.id, "draft deleted");
            Ok(Some(draft.id))
        } else {
            Ok(None)
        }
    }

    async fn merge(
        &self,
        caller: &CallerContext,
        draft: Incident,
        fields: &IncidentFields,
        now: DateTime<Utc>,
    ) -> Result<SaveOutcome> {
        let mut merged = draft.clone();
        apply_draft_fields(&mut merged, caller, fields);

        if merged.diff(&draft).is_empty() {
            return Ok(SaveOutcome::DraftUpdated(draft));
        }

        merged.updated_at = now;
        self.incidents
            .update_incident(merged.clone())
            .await
            .map_err(|err| match err {
                StorageError::Conflict(_) => IncidentError::Conflict(format!(
                    "draft {} was finalized concurrently; retry the save",
                    draft.id
                )),
                other => other.into(),
            })?;
        debug!(incident_id = %merged.id, "draft autosaved");
        Ok(SaveOutcome::DraftUpdated(merged))
    }

    async fn promote(
        &self,
        caller: &CallerContext,
        draft: Incident,
        fields: &IncidentFields,
        status: Status,
        now: DateTime<Utc>,
    ) -> Result<SaveOutcome> {
        let mut promoted = draft.clone();
        apply_draft_fields(&mut promoted, caller, fields);
        promoted.finalize(status, now);

        self.incidents
            .promote_draft(promoted.clone())
            .await
            .map_err(|err| match err {
                StorageError::Conflict(_) => {
                    IncidentError::Conflict(format!("draft {} was already finalized", draft.id))
                }
                other => other.into(),
            })?;

        info!(incident_id = %promoted.id, status = %status, "draft promoted");
        Ok(SaveOutcome::Finalized {
            incident: promoted,
            promoted_from: Some(draft),
        })
    }
}

/// Overlay supplied fields onto a draft. Status and the draft flag are
/// lifecycle fields and never change here; assignee changes need ADMIN.
fn apply_draft_fields(draft: &mut Incident, caller: &CallerContext, fields: &IncidentFields) {
    if let Some(title) = &fields.title {
        draft.title = title.trim().to_string();
    }
    if let Some(description) = &fields.description {
        draft.description = description.clone();
    }
    if let Some(severity) = fields.severity {
        draft.severity = severity;
    }
    if caller.is_admin() {
        if let Some(assignee) = fields.assigned_to_id {
            draft.assigned_to_id = assignee;
        }
    }
}
