//! Audit and notification writes are best-effort: their failure never
//! fails or rolls back the primary write.

use async_trait::async_trait;
use chrono::Utc;
use incident_core::IncidentService;
use incident_storage::{
    AuditStore, InMemoryIncidentStorage, NotificationStore, QueryWindow, StorageError,
    StorageResult, UserStore,
};
use incident_types::{
    AuditAppend, AuditFilter, AuditLogEntry, CallerContext, IncidentFields, Notification,
    NotificationFilter, NotificationId, Role, User, UserId,
};
use std::sync::Arc;

#[derive(Debug, Default)]
struct BrokenAuditStore;

#[async_trait]
impl AuditStore for BrokenAuditStore {
    async fn append_audit(&self, _event: AuditAppend) -> StorageResult<AuditLogEntry> {
        Err(StorageError::Backend("audit store offline".into()))
    }

    async fn list_audit(
        &self,
        _filter: &AuditFilter,
        _window: QueryWindow,
    ) -> StorageResult<Vec<AuditLogEntry>> {
        Err(StorageError::Backend("audit store offline".into()))
    }

    async fn count_audit(&self, _filter: &AuditFilter) -> StorageResult<u64> {
        Err(StorageError::Backend("audit store offline".into()))
    }
}

#[derive(Debug, Default)]
struct BrokenNotificationStore;

#[async_trait]
impl NotificationStore for BrokenNotificationStore {
    async fn insert_notification(&self, _notification: Notification) -> StorageResult<()> {
        Err(StorageError::Backend("notification store offline".into()))
    }

    async fn list_notifications(
        &self,
        _recipient_id: &UserId,
        _filter: &NotificationFilter,
        _window: QueryWindow,
    ) -> StorageResult<Vec<Notification>> {
        Ok(Vec::new())
    }

    async fn count_notifications(
        &self,
        _recipient_id: &UserId,
        _filter: &NotificationFilter,
    ) -> StorageResult<u64> {
        Ok(0)
    }

    async fn mark_read(
        &self,
        _id: &NotificationId,
        _recipient_id: &UserId,
    ) -> StorageResult<Option<Notification>> {
        Ok(None)
    }

    async fn mark_all_read(&self, _recipient_id: &UserId) -> StorageResult<u64> {
        Ok(0)
    }
}

async fn seeded_storage() -> (Arc<InMemoryIncidentStorage>, CallerContext, CallerContext) {
    let storage = Arc::new(InMemoryIncidentStorage::new());
    let admin = User::new("admin@example.com", Role::Admin, Utc::now());
    let user = User::new("u1@example.com", Role::User, Utc::now());
    storage.insert_user(admin.clone()).await.unwrap();
    storage.insert_user(user.clone()).await.unwrap();
    (
        storage,
        CallerContext::admin(admin.id),
        CallerContext::user(user.id),
    )
}

#[tokio::test]
async fn failing_audit_store_does_not_fail_mutations() {
    let (storage, admin, user) = seeded_storage().await;
    let service = IncidentService::builder()
        .with_incident_store(storage.clone())
        .with_notification_store(storage.clone())
        .with_user_store(storage.clone())
        .with_audit_store(Arc::new(BrokenAuditStore))
        .build()
        .unwrap();

    let incident = service
        .create_or_promote(&user, IncidentFields::default().with_title("X"), true)
        .await
        .unwrap();
    let fetched = service.get(&admin, incident.id).await.unwrap();
    assert!(!fetched.is_draft);

    let assigned = service.assign(&admin, incident.id, admin.id).await.unwrap();
    assert_eq!(assigned.assigned_to_id, Some(admin.id));
    service.delete(&admin, incident.id).await.unwrap();

    // Notifications still went out: one for the creation, one for the assignment.
    let inbox = service
        .list_notifications(&admin, NotificationFilter::default(), Default::default())
        .await
        .unwrap();
    assert_eq!(inbox.page.total, 2);
}

#[tokio::test]
async fn failing_notification_store_does_not_fail_mutations() {
    let (storage, admin, user) = seeded_storage().await;
    let service = IncidentService::builder()
        .with_incident_store(storage.clone())
        .with_audit_store(storage.clone())
        .with_user_store(storage.clone())
        .with_notification_store(Arc::new(BrokenNotificationStore))
        .build()
        .unwrap();

    let incident = service
        .create_or_promote(&user, IncidentFields::default().with_title("X"), true)
        .await
        .unwrap();
    let updated = service
        .update(
            &admin,
            incident.id,
            IncidentFields::default().with_assignee(admin.id),
        )
        .await
        .unwrap();
    assert_eq!(updated.assigned_to_id, Some(admin.id));

    // The audit trail is intact.
    let entries = service
        .admin()
        .list_audit(&admin, AuditFilter::for_incident(incident.id), Default::default())
        .await
        .unwrap();
    assert_eq!(entries.total, 2);
}

#[tokio::test]
async fn builder_requires_every_store() {
    let storage = Arc::new(InMemoryIncidentStorage::new());
    let result = IncidentService::builder()
        .with_incident_store(storage.clone())
        .with_user_store(storage)
        .build();
    assert!(matches!(
        result,
        Err(incident_core::IncidentError::Configuration(_))
    ));
}
