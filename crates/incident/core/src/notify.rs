//! Notification fan-out.

use crate::error::{IncidentError, Result};
use chrono::Utc;
use incident_storage::{NotificationStore, QueryWindow, UserStore};
use incident_types::{
    IncidentId, Notification, NotificationFilter, NotificationId, NotificationType, Page,
    PageRequest, UserId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Values substituted into message templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageArgs<'a> {
    pub title: Option<&'a str>,
    pub actor_email: Option<&'a str>,
}

impl<'a> MessageArgs<'a> {
    pub fn title(title: &'a str) -> Self {
        Self {
            title: Some(title),
            actor_email: None,
        }
    }

    pub fn with_actor_email(mut self, email: Option<&'a str>) -> Self {
        self.actor_email = email;
        self
    }
}

/// Render the fixed template for `kind`. Unknown types render empty.
pub fn render_message(kind: &NotificationType, args: &MessageArgs<'_>) -> String {
    let title = args.title.filter(|t| !t.is_empty()).unwrap_or("Untitled");
    match kind {
        NotificationType::IncidentCreated => format!(
            "New incident '{}' created by {}",
            title,
            args.actor_email.filter(|e| !e.is_empty()).unwrap_or("a user")
        ),
        NotificationType::IncidentAssigned => {
            format!("Incident '{}' has been assigned to you", title)
        }
        NotificationType::IncidentUpdated => format!("Incident '{}' has been updated", title),
        NotificationType::Custom(_) => String::new(),
    }
}

/// One page of notifications plus the caller's total unread count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPage {
    #[serde(flatten)]
    pub page: Page<Notification>,
    pub unread_count: u64,
}

/// Creates and serves recipient-addressed notifications.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifications: Arc<dyn NotificationStore>,
    users: Arc<dyn UserStore>,
}

impl NotificationDispatcher {
    pub fn new(notifications: Arc<dyn NotificationStore>, users: Arc<dyn UserStore>) -> Self {
        Self {
            notifications,
            users,
        }
    }

    /// Create one notification for `recipient_id`.
    #[instrument(skip_all, fields(recipient = %recipient_id, kind = %kind))]
    pub async fn notify(
        &self,
        recipient_id: UserId,
        kind: NotificationType,
        incident_id: Option<IncidentId>,
        args: MessageArgs<'_>,
    ) -> Result<Notification> {
        let message = render_message(&kind, &args);
        let notification = Notification::new(recipient_id, kind, incident_id, message, Utc::now());
        self.notifications
            .insert_notification(notification.clone())
            .await?;

        debug!(notification_id = %notification.id, "notification created");
        Ok(notification)
    }

    /// Notify one administrator: the earliest-created one. No admin, no notification.
    pub async fn notify_any_admin(
        &self,
        kind: NotificationType,
        incident_id: IncidentId,
        title: &str,
        actor_email: Option<&str>,
    ) -> Result<Option<Notification>> {
        let Some(admin) = self.users.find_first_admin().await? else {
            warn!(incident_id = %incident_id, kind = %kind, "no administrator to notify");
            return Ok(None);
        };

        let args = MessageArgs::title(title).with_actor_email(actor_email);
        self.notify(admin.id, kind, Some(incident_id), args)
            .await
            .map(Some)
    }

    pub async fn notify_user(
        &self,
        user_id: UserId,
        kind: NotificationType,
        incident_id: IncidentId,
        title: &str,
    ) -> Result<Notification> {
        self.notify(user_id, kind, Some(incident_id), MessageArgs::title(title))
            .await
    }

    /// The recipient's notifications, unread first, then newest first.
    pub async fn list(
        &self,
        recipient_id: UserId,
        filter: NotificationFilter,
        page: PageRequest,
    ) -> Result<NotificationPage> {
        let unread = NotificationFilter {
            is_read: Some(false),
        };
        let (data, total, unread_count) = tokio::try_join!(
            self.notifications
                .list_notifications(&recipient_id, &filter, QueryWindow::from(page)),
            self.notifications.count_notifications(&recipient_id, &filter),
            self.notifications.count_notifications(&recipient_id, &unread),
        )?;

        Ok(NotificationPage {
            page: Page::new(data, total, page),
            unread_count,
        })
    }

    /// Mark one of the recipient's notifications read.
    pub async fn mark_read(&self, id: NotificationId, recipient_id: UserId) -> Result<Notification> {
        self.notifications
            .mark_read(&id, &recipient_id)
            .await?
            .ok_or_else(|| IncidentError::not_found("notification"))
    }

    /// Returns how many notifications were flipped.
    pub async fn mark_all_read(&self, recipient_id: UserId) -> Result<u64> {
        let flipped = self.notifications.mark_all_read(&recipient_id).await?;
        debug!(recipient = %recipient_id, flipped, "notifications marked read");
        Ok(flipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use incident_storage::InMemoryIncidentStorage;
    use incident_types::{Role, User};

    fn dispatcher() -> (NotificationDispatcher, Arc<InMemoryIncidentStorage>) {
        let storage = Arc::new(InMemoryIncidentStorage::new());
        (
            NotificationDispatcher::new(storage.clone(), storage.clone()),
            storage,
        )
    }

    #[test]
    fn test_templates() {
        let args = MessageArgs::title("Server Outage").with_actor_email(Some("u1@example.com"));
        assert_eq!(
            render_message(&NotificationType::IncidentCreated, &args),
            "New incident 'Server Outage' created by u1@example.com"
        );
        assert_eq!(
            render_message(&NotificationType::IncidentAssigned, &args),
            "Incident 'Server Outage' has been assigned to you"
        );
        assert_eq!(
            render_message(&NotificationType::IncidentUpdated, &args),
            "Incident 'Server Outage' has been updated"
        );
        assert_eq!(
            render_message(&NotificationType::Custom("PING".into()), &args),
            ""
        );
    }

    #[test]
    fn test_template_fallbacks() {
        assert_eq!(
            render_message(&NotificationType::IncidentCreated, &MessageArgs::default()),
            "New incident 'Untitled' created by a user"
        );
    }

    #[tokio::test]
    async fn test_notify_any_admin_without_admin_is_noop() {
        let (dispatcher, storage) = dispatcher();
        let incident = IncidentId::generate();

        let sent = dispatcher
            .notify_any_admin(NotificationType::IncidentCreated, incident, "x", None)
            .await
            .unwrap();
        assert!(sent.is_none());

        let admin = User::new("admin@example.com", Role::Admin, Utc::now());
        storage.insert_user(admin.clone()).await.unwrap();
        let sent = dispatcher
            .notify_any_admin(NotificationType::IncidentCreated, incident, "x", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sent.recipient_id, admin.id);
        assert_eq!(sent.incident_id, Some(incident));
    }

    #[tokio::test]
    async fn test_list_reports_unread_count_independent_of_filter() {
        let (dispatcher, _storage) = dispatcher();
        let recipient = UserId::generate();
        let incident = IncidentId::generate();

        let first = dispatcher
            .notify_user(recipient, NotificationType::IncidentAssigned, incident, "a")
            .await
            .unwrap();
        dispatcher
            .notify_user(recipient, NotificationType::IncidentAssigned, incident, "b")
            .await
            .unwrap();
        dispatcher.mark_read(first.id, recipient).await.unwrap();

        let read_only = dispatcher
            .list(
                recipient,
                NotificationFilter {
                    is_read: Some(true),
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(read_only.page.total, 1);
        assert_eq!(read_only.unread_count, 1);
    }

    #[tokio::test]
    async fn test_mark_read_of_foreign_notification_is_not_found() {
        let (dispatcher, _storage) = dispatcher();
        let owner = UserId::generate();
        let sent = dispatcher
            .notify_user(
                owner,
                NotificationType::IncidentAssigned,
                IncidentId::generate(),
                "x",
            )
            .await
            .unwrap();

        let result = dispatcher.mark_read(sent.id, UserId::generate()).await;
        assert!(matches!(result, Err(IncidentError::NotFound(_))));
        assert_eq!(dispatcher.mark_all_read(owner).await.unwrap(), 1);
        assert_eq!(dispatcher.mark_all_read(owner).await.unwrap(), 0);
    }
}
