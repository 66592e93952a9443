//! In-memory reference implementation of the incident storage traits.
//!
//! This adapter is deterministic and test-friendly. Production deployments
//! should use a transactional backend (e.g. PostgreSQL).

use crate::traits::{AuditStore, IncidentStore, NotificationStore, QueryWindow, UserStore};
use crate::error::check_lifecycle;
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use incident_types::{
    normalize_email, AuditAppend, AuditEntryId, AuditFilter, AuditLogEntry, Incident,
    IncidentFilter, IncidentId, Notification, NotificationFilter, NotificationId, Role, User,
    UserId,
};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory incident storage adapter.
#[derive(Default)]
pub struct InMemoryIncidentStorage {
    incidents: RwLock<HashMap<IncidentId, Incident>>,
    audits: RwLock<Vec<AuditLogEntry>>,
    notifications: RwLock<HashMap<NotificationId, Notification>>,
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryIncidentStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(what: &str) -> StorageError {
    StorageError::Backend(format!("{what} lock poisoned"))
}

/// Another draft owned by the same creator, excluding `incident` itself.
fn competing_draft<'a>(
    rows: &'a HashMap<IncidentId, Incident>,
    incident: &Incident,
) -> Option<&'a Incident> {
    rows.values()
        .find(|row| row.is_draft && row.creator_id == incident.creator_id && row.id != incident.id)
}

#[async_trait]
impl IncidentStore for InMemoryIncidentStorage {
    async fn insert_incident(&self, incident: Incident) -> StorageResult<()> {
        check_lifecycle(&incident)?;
        let mut guard = self.incidents.write().map_err(|_| poisoned("incidents"))?;

        if guard.contains_key(&incident.id) {
            return Err(StorageError::Conflict(format!(
                "incident {} already exists",
                incident.id
            )));
        }
        if incident.is_draft {
            if let Some(existing) = competing_draft(&guard, &incident) {
                return Err(StorageError::Conflict(format!(
                    "creator {} already has draft {}",
                    incident.creator_id, existing.id
                )));
            }
        }

        guard.insert(incident.id, incident);
        Ok(())
    }

    async fn get_incident(&self, id: &IncidentId) -> StorageResult<Option<Incident>> {
        let guard = self.incidents.read().map_err(|_| poisoned("incidents"))?;
        Ok(guard.get(id).cloned())
    }

    async fn find_draft(&self, creator_id: &UserId) -> StorageResult<Option<Incident>> {
        let guard = self.incidents.read().map_err(|_| poisoned("incidents"))?;
        Ok(guard
            .values()
            .find(|row| row.is_draft && row.creator_id == *creator_id)
            .cloned())
    }

    async fn update_incident(&self, incident: Incident) -> StorageResult<()> {
        check_lifecycle(&incident)?;
        let mut guard = self.incidents.write().map_err(|_| poisoned("incidents"))?;

        let stored = guard.get(&incident.id).ok_or_else(|| {
            StorageError::NotFound(format!("incident {} not found", incident.id))
        })?;
        if stored.is_draft != incident.is_draft {
            return Err(StorageError::Conflict(format!(
                "incident {} changed lifecycle state",
                incident.id
            )));
        }
        if incident.is_draft && competing_draft(&guard, &incident).is_some() {
            return Err(StorageError::Conflict(format!(
                "creator {} already has a draft",
                incident.creator_id
            )));
        }

        guard.insert(incident.id, incident);
        Ok(())
    }

    async fn promote_draft(&self, incident: Incident) -> StorageResult<()> {
        check_lifecycle(&incident)?;
        let mut guard = self.incidents.write().map_err(|_| poisoned("incidents"))?;
        let stored = guard.get_mut(&incident.id).ok_or_else(|| {
            StorageError::NotFound(format!("incident {} not found", incident.id))
        })?;

        if !stored.is_draft {
            return Err(StorageError::Conflict(format!(
                "incident {} is no longer a draft",
                incident.id
            )));
        }

        *stored = incident;
        Ok(())
    }

    async fn delete_incident(&self, id: &IncidentId) -> StorageResult<bool> {
        let mut guard = self.incidents.write().map_err(|_| poisoned("incidents"))?;
        Ok(guard.remove(id).is_some())
    }

    async fn list_incidents(
        &self,
        filter: &IncidentFilter,
        window: QueryWindow,
    ) -> StorageResult<Vec<Incident>> {
        let guard = self.incidents.read().map_err(|_| poisoned("incidents"))?;
        let mut values = guard
            .values()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(apply_window(values, window))
    }

    async fn count_incidents(&self, filter: &IncidentFilter) -> StorageResult<u64> {
        let guard = self.incidents.read().map_err(|_| poisoned("incidents"))?;
        Ok(guard.values().filter(|row| filter.matches(row)).count() as u64)
    }
}

#[async_trait]
impl AuditStore for InMemoryIncidentStorage {
    async fn append_audit(&self, event: AuditAppend) -> StorageResult<AuditLogEntry> {
        let mut guard = self.audits.write().map_err(|_| poisoned("audit"))?;

        let entry = AuditLogEntry {
            id: AuditEntryId::generate(),
            sequence: guard.len() as u64 + 1,
            incident_id: event.incident_id,
            actor_id: event.actor_id,
            action: event.action,
            before_snapshot: event.before,
            after_snapshot: event.after,
            created_at: Utc::now(),
        };

        guard.push(entry.clone());
        Ok(entry)
    }

    async fn list_audit(
        &self,
        filter: &AuditFilter,
        window: QueryWindow,
    ) -> StorageResult<Vec<AuditLogEntry>> {
        let guard = self.audits.read().map_err(|_| poisoned("audit"))?;
        let mut values = guard
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.sequence.cmp(&a.sequence))
        });
        Ok(apply_window(values, window))
    }

    async fn count_audit(&self, filter: &AuditFilter) -> StorageResult<u64> {
        let guard = self.audits.read().map_err(|_| poisoned("audit"))?;
        Ok(guard.iter().filter(|entry| filter.matches(entry)).count() as u64)
    }
}

fn notification_matches(
    notification: &Notification,
    recipient_id: &UserId,
    filter: &NotificationFilter,
) -> bool {
    notification.recipient_id == *recipient_id
        && filter.is_read.map_or(true, |read| notification.is_read == read)
}

#[async_trait]
impl NotificationStore for InMemoryIncidentStorage {
    async fn insert_notification(&self, notification: Notification) -> StorageResult<()> {
        let mut guard = self
            .notifications
            .write()
            .map_err(|_| poisoned("notifications"))?;
        if guard.contains_key(&notification.id) {
            return Err(StorageError::Conflict(format!(
                "notification {} already exists",
                notification.id
            )));
        }
        guard.insert(notification.id, notification);
        Ok(())
    }

    async fn list_notifications(
        &self,
        recipient_id: &UserId,
        filter: &NotificationFilter,
        window: QueryWindow,
    ) -> StorageResult<Vec<Notification>> {
        let guard = self
            .notifications
            .read()
            .map_err(|_| poisoned("notifications"))?;
        let mut values = guard
            .values()
            .filter(|n| notification_matches(n, recipient_id, filter))
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| {
            a.is_read
                .cmp(&b.is_read)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(apply_window(values, window))
    }

    async fn count_notifications(
        &self,
        recipient_id: &UserId,
        filter: &NotificationFilter,
    ) -> StorageResult<u64> {
        let guard = self
            .notifications
            .read()
            .map_err(|_| poisoned("notifications"))?;
        Ok(guard
            .values()
            .filter(|n| notification_matches(n, recipient_id, filter))
            .count() as u64)
    }

    async fn mark_read(
        &self,
        id: &NotificationId,
        recipient_id: &UserId,
    ) -> StorageResult<Option<Notification>> {
        let mut guard = self
            .notifications
            .write()
            .map_err(|_| poisoned("notifications"))?;
        match guard.get_mut(id) {
            Some(notification) if notification.recipient_id == *recipient_id => {
                notification.is_read = true;
                Ok(Some(notification.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_all_read(&self, recipient_id: &UserId) -> StorageResult<u64> {
        let mut guard = self
            .notifications
            .write()
            .map_err(|_| poisoned("notifications"))?;
        let mut flipped = 0;
        for notification in guard
            .values_mut()
            .filter(|n| n.recipient_id == *recipient_id && !n.is_read)
        {
            notification.is_read = true;
            flipped += 1;
        }
        Ok(flipped)
    }
}

#[async_trait]
impl UserStore for InMemoryIncidentStorage {
    async fn insert_user(&self, user: User) -> StorageResult<()> {
        let mut guard = self.users.write().map_err(|_| poisoned("users"))?;
        let email = normalize_email(&user.email);
        if guard
            .values()
            .any(|existing| normalize_email(&existing.email) == email)
        {
            return Err(StorageError::Conflict(format!(
                "user with email {} already exists",
                user.email
            )));
        }
        if guard.contains_key(&user.id) {
            return Err(StorageError::Conflict(format!("user {} already exists", user.id)));
        }
        guard.insert(user.id, user);
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> StorageResult<Option<User>> {
        let guard = self.users.read().map_err(|_| poisoned("users"))?;
        Ok(guard.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        let guard = self.users.read().map_err(|_| poisoned("users"))?;
        let email = normalize_email(email);
        Ok(guard
            .values()
            .find(|user| normalize_email(&user.email) == email)
            .cloned())
    }

    async fn find_first_admin(&self) -> StorageResult<Option<User>> {
        let guard = self.users.read().map_err(|_| poisoned("users"))?;
        Ok(guard
            .values()
            .filter(|user| user.is_admin())
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .cloned())
    }

    async fn update_user_role(
        &self,
        id: &UserId,
        role: Role,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<User> {
        let mut guard = self.users.write().map_err(|_| poisoned("users"))?;
        let user = guard
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("user {} not found", id)))?;
        user.role = role;
        user.updated_at = updated_at;
        Ok(user.clone())
    }

    async fn list_users(&self, window: QueryWindow) -> StorageResult<Vec<User>> {
        let guard = self.users.read().map_err(|_| poisoned("users"))?;
        let mut values = guard.values().cloned().collect::<Vec<_>>();
        values.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(apply_window(values, window))
    }

    async fn count_users(&self) -> StorageResult<u64> {
        let guard = self.users.read().map_err(|_| poisoned("users"))?;
        Ok(guard.len() as u64)
    }
}

fn apply_window<T>(items: Vec<T>, window: QueryWindow) -> Vec<T> {
    let iter = items.into_iter().skip(window.offset);
    if window.limit == 0 {
        iter.collect()
    } else {
        iter.take(window.limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use incident_types::{AuditAction, NotificationType, Status};

    fn append(incident_id: IncidentId, actor_id: UserId, action: AuditAction) -> AuditAppend {
        AuditAppend {
            incident_id,
            actor_id,
            action,
            before: None,
            after: Some(serde_json::json!({"title": "x"})),
        }
    }

    #[tokio::test]
    async fn second_draft_for_same_creator_conflicts() {
        let storage = InMemoryIncidentStorage::new();
        let creator = UserId::generate();

        storage
            .insert_incident(Incident::new_draft(creator, "first", None, Utc::now()))
            .await
            .unwrap();
        let result = storage
            .insert_incident(Incident::new_draft(creator, "second", None, Utc::now()))
            .await;
        assert!(matches!(result, Err(StorageError::Conflict(_))));

        // Finalized rows are not subject to the draft constraint.
        storage
            .insert_incident(Incident::new_finalized(
                creator,
                "real",
                Status::Open,
                None,
                Utc::now(),
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn promote_only_succeeds_once() {
        let storage = InMemoryIncidentStorage::new();
        let draft = Incident::new_draft(UserId::generate(), "x", None, Utc::now());
        storage.insert_incident(draft.clone()).await.unwrap();

        let mut promoted = draft.clone();
        promoted.finalize(Status::Open, Utc::now());
        storage.promote_draft(promoted.clone()).await.unwrap();

        let again = storage.promote_draft(promoted).await;
        assert!(matches!(again, Err(StorageError::Conflict(_))));
        assert!(storage.find_draft(&draft.creator_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_missing_incident_is_not_found() {
        let storage = InMemoryIncidentStorage::new();
        let incident = Incident::new_draft(UserId::generate(), "x", None, Utc::now());
        let result = storage.update_incident(incident).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn stale_draft_update_after_finalize_conflicts() {
        let storage = InMemoryIncidentStorage::new();
        let draft = Incident::new_draft(UserId::generate(), "x", None, Utc::now());
        storage.insert_incident(draft.clone()).await.unwrap();

        let mut finalized = draft.clone();
        finalized.finalize(Status::Open, Utc::now());
        storage.promote_draft(finalized).await.unwrap();

        let mut stale = draft.clone();
        stale.description = Some("late autosave".to_string());
        let result = storage.update_incident(stale).await;
        assert!(matches!(result, Err(StorageError::Conflict(_))));

        let stored = storage.get_incident(&draft.id).await.unwrap().unwrap();
        assert!(!stored.is_draft);
        assert_eq!(stored.status, Status::Open);
        assert!(stored.description.is_none());
        assert!(storage.find_draft(&draft.creator_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mismatched_draft_flag_is_rejected() {
        let storage = InMemoryIncidentStorage::new();
        let mut incident = Incident::new_draft(UserId::generate(), "x", None, Utc::now());
        incident.status = Status::Open;

        let result = storage.insert_incident(incident.clone()).await;
        assert!(matches!(result, Err(StorageError::InvariantViolation(_))));
        assert!(storage.get_incident(&incident.id).await.unwrap().is_none());

        let mut finalized = Incident::new_finalized(
            UserId::generate(),
            "y",
            Status::Open,
            None,
            Utc::now(),
        );
        storage.insert_incident(finalized.clone()).await.unwrap();
        finalized.status = Status::Draft;
        let result = storage.update_incident(finalized).await;
        assert!(matches!(result, Err(StorageError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn incidents_list_newest_first_with_window() {
        let storage = InMemoryIncidentStorage::new();
        let creator = UserId::generate();
        let base = Utc::now();
        for i in 0..5 {
            storage
                .insert_incident(Incident::new_finalized(
                    creator,
                    format!("incident {i}"),
                    Status::Open,
                    None,
                    base + Duration::seconds(i),
                ))
                .await
                .unwrap();
        }

        let filter = IncidentFilter::new();
        let page = storage
            .list_incidents(&filter, QueryWindow { limit: 2, offset: 1 })
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].title, "incident 3");
        assert_eq!(page[1].title, "incident 2");
        assert_eq!(storage.count_incidents(&filter).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn audit_is_listed_newest_first_and_filtered() {
        let storage = InMemoryIncidentStorage::new();
        let incident = IncidentId::generate();
        let other = IncidentId::generate();
        let actor = UserId::generate();

        storage
            .append_audit(append(incident, actor, AuditAction::Created))
            .await
            .unwrap();
        storage
            .append_audit(append(other, actor, AuditAction::Created))
            .await
            .unwrap();
        storage
            .append_audit(append(incident, actor, AuditAction::Updated))
            .await
            .unwrap();

        let filter = AuditFilter::for_incident(incident);
        let entries = storage.list_audit(&filter, QueryWindow::all()).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, AuditAction::Updated);
        assert_eq!(entries[1].action, AuditAction::Created);
        assert_eq!(storage.count_audit(&AuditFilter::default()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn notifications_order_unread_first() {
        let storage = InMemoryIncidentStorage::new();
        let recipient = UserId::generate();
        let base = Utc::now();

        let old_unread = Notification::new(
            recipient,
            NotificationType::IncidentAssigned,
            None,
            "old",
            base,
        );
        let mut new_read = Notification::new(
            recipient,
            NotificationType::IncidentAssigned,
            None,
            "new",
            base + Duration::seconds(5),
        );
        new_read.is_read = true;
        storage.insert_notification(new_read).await.unwrap();
        storage.insert_notification(old_unread).await.unwrap();

        let listed = storage
            .list_notifications(&recipient, &NotificationFilter::default(), QueryWindow::all())
            .await
            .unwrap();
        assert_eq!(listed[0].message, "old");
        assert_eq!(listed[1].message, "new");
    }

    #[tokio::test]
    async fn mark_read_respects_recipient() {
        let storage = InMemoryIncidentStorage::new();
        let owner = UserId::generate();
        let notification =
            Notification::new(owner, NotificationType::IncidentCreated, None, "m", Utc::now());
        let id = notification.id;
        storage.insert_notification(notification).await.unwrap();

        assert!(storage
            .mark_read(&id, &UserId::generate())
            .await
            .unwrap()
            .is_none());
        let read = storage.mark_read(&id, &owner).await.unwrap().unwrap();
        assert!(read.is_read);

        assert_eq!(storage.mark_all_read(&owner).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn user_email_is_unique_case_insensitively() {
        let storage = InMemoryIncidentStorage::new();
        storage
            .insert_user(User::new("Admin@Example.com", Role::Admin, Utc::now()))
            .await
            .unwrap();
        let duplicate = storage
            .insert_user(User::new("admin@example.com ", Role::User, Utc::now()))
            .await;
        assert!(matches!(duplicate, Err(StorageError::Conflict(_))));
        assert!(storage
            .find_user_by_email("ADMIN@example.com")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn first_admin_is_earliest_created() {
        let storage = InMemoryIncidentStorage::new();
        assert!(storage.find_first_admin().await.unwrap().is_none());

        let base = Utc::now();
        let late = User::new("late@example.com", Role::Admin, base + Duration::seconds(10));
        let early = User::new("early@example.com", Role::Admin, base);
        let user = User::new("user@example.com", Role::User, base - Duration::seconds(10));
        storage.insert_user(late).await.unwrap();
        storage.insert_user(user).await.unwrap();
        storage.insert_user(early.clone()).await.unwrap();

        let admin = storage.find_first_admin().await.unwrap().unwrap();
        assert_eq!(admin.id, early.id);
    }
}
