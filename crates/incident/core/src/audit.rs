//! Append-only audit trail for incident mutations.

use crate::error::Result;
use incident_storage::{AuditStore, QueryWindow, StorageError};
use incident_types::{
    AuditAction, AuditAppend, AuditFilter, AuditLogEntry, Incident, IncidentId, Page, PageRequest,
    UserId,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Records before/after snapshots of incidents.
///
/// Snapshots are serialized at call time, so later mutation of the
/// incident value cannot leak into an entry already written.
#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Append one entry.
    #[instrument(skip_all, fields(action = %action, incident_id = %incident_id))]
    pub async fn record(
        &self,
        action: AuditAction,
        incident_id: IncidentId,
        actor_id: UserId,
        before: Option<&Incident>,
        after: Option<&Incident>,
    ) -> Result<AuditLogEntry> {
        let entry = self
            .store
            .append_audit(AuditAppend {
                incident_id,
                actor_id,
                action,
                before: before.map(snapshot).transpose()?,
                after: after.map(snapshot).transpose()?,
            })
            .await?;

        debug!(audit_id = %entry.id, sequence = entry.sequence, "audit entry recorded");
        Ok(entry)
    }

    /// Entries for one incident, newest first.
    pub async fn list_by_incident(
        &self,
        incident_id: IncidentId,
        page: PageRequest,
    ) -> Result<Page<AuditLogEntry>> {
        self.list_all(AuditFilter::for_incident(incident_id), page)
            .await
    }

    /// Entries matching `filter`, newest first.
    pub async fn list_all(
        &self,
        filter: AuditFilter,
        page: PageRequest,
    ) -> Result<Page<AuditLogEntry>> {
        let (data, total) = tokio::try_join!(
            self.store.list_audit(&filter, QueryWindow::from(page)),
            self.store.count_audit(&filter),
        )?;
        Ok(Page::new(data, total, page))
    }
}

fn snapshot(incident: &Incident) -> Result<Value> {
    serde_json::to_value(incident)
        .map_err(|e| StorageError::Serialization(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use incident_storage::InMemoryIncidentStorage;
    use incident_types::Status;

    #[tokio::test]
    async fn test_snapshot_is_taken_at_call_time() {
        let recorder = AuditRecorder::new(Arc::new(InMemoryIncidentStorage::new()));
        let actor = UserId::generate();
        let mut incident =
            Incident::new_finalized(actor, "Server Outage", Status::Open, None, Utc::now());

        let entry = recorder
            .record(AuditAction::Created, incident.id, actor, None, Some(&incident))
            .await
            .unwrap();
        incident.title = "changed later".to_string();

        let after = entry.after_snapshot.unwrap();
        assert_eq!(after["title"], "Server Outage");
        assert_eq!(after["isDraft"], false);
        assert!(entry.before_snapshot.is_none());
    }

    #[tokio::test]
    async fn test_list_by_incident_pages_newest_first() {
        let recorder = AuditRecorder::new(Arc::new(InMemoryIncidentStorage::new()));
        let actor = UserId::generate();
        let incident = Incident::new_finalized(actor, "x", Status::Open, None, Utc::now());

        for action in [AuditAction::Created, AuditAction::Updated, AuditAction::StatusChanged] {
            recorder
                .record(action, incident.id, actor, None, Some(&incident))
                .await
                .unwrap();
        }

        let page = recorder
            .list_by_incident(incident.id, PageRequest::new(1, 2))
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.data[0].action, AuditAction::StatusChanged);
        assert_eq!(page.data[1].action, AuditAction::Updated);
    }
}
