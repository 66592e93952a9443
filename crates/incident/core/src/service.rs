//! Incident service facade
//!
//! Orchestrates access checks, the primary store write and the follow-up
//! audit/notification writes for every public incident operation.
//!
//! Side effects run after the primary write has committed. They are issued
//! concurrently, both awaited, and a failure in either is logged and
//! swallowed: the caller always sees the committed primary write.

use crate::admin::AdminService;
use crate::audit::AuditRecorder;
use crate::drafts::{check_title, finalized_status, DraftReconciler, SaveOutcome};
use crate::error::{IncidentError, Result};
use crate::notify::{NotificationDispatcher, NotificationPage};
use chrono::Utc;
use incident_policy::{AccessMode, AccessPolicy, AssignmentOwnership};
use incident_storage::{
    AuditStore, IncidentStorage, IncidentStore, NotificationStore, QueryWindow, UserStore,
};
use incident_types::{
    AuditAction, AuditLogEntry, CallerContext, Incident, IncidentField, IncidentFields,
    IncidentId, IncidentQuery, Notification, NotificationFilter, NotificationId,
    NotificationType, Page, PageRequest, Status, UserId, MAX_PAGE_SIZE,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Entry point for incident operations.
#[derive(Clone)]
pub struct IncidentService {
    incidents: Arc<dyn IncidentStore>,
    users: Arc<dyn UserStore>,
    policy: Arc<dyn AccessPolicy>,
    drafts: DraftReconciler,
    audit: AuditRecorder,
    notifier: NotificationDispatcher,
    max_page_size: u32,
}

impl IncidentService {
    pub fn builder() -> IncidentServiceBuilder {
        IncidentServiceBuilder::new()
    }

    /// Service over a single storage backend with the default policy.
    pub fn with_storage<S>(storage: Arc<S>) -> Self
    where
        S: IncidentStorage + 'static,
    {
        let incidents: Arc<dyn IncidentStore> = storage.clone();
        let audit: Arc<dyn AuditStore> = storage.clone();
        let notifications: Arc<dyn NotificationStore> = storage.clone();
        let users: Arc<dyn UserStore> = storage;
        Self::from_parts(
            incidents,
            audit,
            notifications,
            users,
            Arc::new(AssignmentOwnership::new()),
            MAX_PAGE_SIZE,
        )
    }

    fn from_parts(
        incidents: Arc<dyn IncidentStore>,
        audit: Arc<dyn AuditStore>,
        notifications: Arc<dyn NotificationStore>,
        users: Arc<dyn UserStore>,
        policy: Arc<dyn AccessPolicy>,
        max_page_size: u32,
    ) -> Self {
        Self {
            drafts: DraftReconciler::new(incidents.clone()),
            audit: AuditRecorder::new(audit),
            notifier: NotificationDispatcher::new(notifications, users.clone()),
            incidents,
            users,
            policy,
            max_page_size,
        }
    }

    /// User management and the admin-wide audit view.
    pub fn admin(&self) -> AdminService {
        AdminService::new(
            self.users.clone(),
            self.audit.clone(),
            self.policy.clone(),
            self.max_page_size,
        )
    }

    pub fn max_page_size(&self) -> u32 {
        self.max_page_size
    }

    // ------------------------------------------------------------------
    // Drafts and creation
    // ------------------------------------------------------------------

    /// Create a new incident, or save into / promote the caller's draft.
    #[instrument(skip_all, fields(caller = %caller.id))]
    pub async fn create_or_promote(
        &self,
        caller: &CallerContext,
        fields: IncidentFields,
        finalize: bool,
    ) -> Result<Incident> {
        self.check_assignee_settable(caller, &fields).await?;

        let outcome = self.drafts.reconcile_save(caller, fields, finalize).await?;
        if let SaveOutcome::Finalized { incident, .. } = &outcome {
            self.after_finalize(caller, incident).await;
        }
        Ok(outcome.into_incident())
    }

    /// Merge a partial payload into the caller's draft, creating it if needed.
    #[instrument(skip_all, fields(caller = %caller.id))]
    pub async fn auto_save(
        &self,
        caller: &CallerContext,
        fields: IncidentFields,
    ) -> Result<Incident> {
        self.check_assignee_settable(caller, &fields).await?;
        self.drafts.autosave(caller, fields).await
    }

    pub async fn get_draft(&self, caller: &CallerContext) -> Result<Option<Incident>> {
        self.drafts.get_draft(caller.id).await
    }

    /// Idempotent.
    pub async fn delete_draft(&self, caller: &CallerContext) -> Result<()> {
        self.drafts.delete_draft(caller.id).await.map(|_| ())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub async fn get(&self, caller: &CallerContext, id: IncidentId) -> Result<Incident> {
        let incident = self.incidents.get_incident(&id).await?;
        self.policy
            .authorize(caller, incident.as_ref(), AccessMode::Ownership)?;
        incident.ok_or_else(|| IncidentError::not_found("incident"))
    }

    /// Paged list scoped by the access policy. Drafts never appear.
    #[instrument(skip_all, fields(caller = %caller.id))]
    pub async fn list(
        &self,
        caller: &CallerContext,
        query: &IncidentQuery,
        page: PageRequest,
    ) -> Result<Page<Incident>> {
        let page = page.clamped(self.max_page_size);
        let filter = self.policy.list_scope(caller, query);

        let (data, total) = tokio::try_join!(
            self.incidents
                .list_incidents(&filter, QueryWindow::from(page)),
            self.incidents.count_incidents(&filter),
        )?;
        Ok(Page::new(data, total, page))
    }

    /// The admin console listing: every finalized incident, still honoring
    /// the caller-supplied filters.
    pub async fn list_all(
        &self,
        caller: &CallerContext,
        query: &IncidentQuery,
        page: PageRequest,
    ) -> Result<Page<Incident>> {
        self.policy.require_admin(caller)?;
        self.list(caller, query, page).await
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Apply a partial update.
    ///
    /// Nothing is written or audited when the payload changes nothing. On a
    /// draft, `isDraft=false` promotes the row; a status alone is ignored.
    #[instrument(skip_all, fields(caller = %caller.id, incident_id = %id))]
    pub async fn update(
        &self,
        caller: &CallerContext,
        id: IncidentId,
        fields: IncidentFields,
    ) -> Result<Incident> {
        let existing = self.get(caller, id).await?;
        check_title(fields.title.as_deref())?;

        let mut after = existing.clone();
        if let Some(title) = &fields.title {
            after.title = title.trim().to_string();
        }
        if let Some(description) = &fields.description {
            after.description = description.clone();
        }
        if let Some(severity) = fields.severity {
            after.severity = severity;
        }
        if let Some(assignee) = fields.assigned_to_id {
            after.assigned_to_id = assignee;
        }

        let now = Utc::now();
        let promoting = existing.is_draft && fields.is_draft == Some(false);
        if promoting {
            after.finalize(finalized_status(fields.status)?, now);
        } else if !existing.is_draft {
            if fields.is_draft == Some(true) {
                return Err(IncidentError::bad_request(
                    "a finalized incident cannot return to draft",
                ));
            }
            if let Some(status) = fields.status {
                if status == Status::Draft {
                    return Err(IncidentError::bad_request(
                        "status DRAFT is reserved for drafts",
                    ));
                }
                after.status = status;
            }
        }

        let changed = existing.diff(&after);
        if changed.is_empty() {
            return Ok(existing);
        }

        if changed.contains(&IncidentField::AssignedTo) {
            if !caller.is_admin() {
                return Err(IncidentError::forbidden(
                    "only administrators can reassign incidents",
                ));
            }
            if let Some(assignee) = after.assigned_to_id {
                self.require_user(assignee).await?;
            }
        }

        after.updated_at = now;
        let new_assignee = after
            .assigned_to_id
            .filter(|_| changed.contains(&IncidentField::AssignedTo));

        if promoting {
            self.incidents.promote_draft(after.clone()).await?;
            info!(incident_id = %id, "draft promoted via update");
            let ((), notify) = tokio::join!(
                self.after_finalize(caller, &after),
                self.notify_assignee(new_assignee, &after),
            );
            log_side_effect("notification", id, notify);
            return Ok(after);
        }
        self.incidents.update_incident(after.clone()).await?;

        let action = if changed == [IncidentField::Status] {
            AuditAction::StatusChanged
        } else {
            AuditAction::Updated
        };
        let (audit, notify) = tokio::join!(
            self.audit
                .record(action, id, caller.id, Some(&existing), Some(&after)),
            self.notify_assignee(new_assignee, &after),
        );
        log_side_effect("audit", id, audit);
        log_side_effect("notification", id, notify);

        info!(incident_id = %id, changed = ?changed, "incident updated");
        Ok(after)
    }

    /// Assign to `assignee`. Always audited and notified, even when unchanged.
    #[instrument(skip_all, fields(caller = %caller.id, incident_id = %id))]
    pub async fn assign(
        &self,
        caller: &CallerContext,
        id: IncidentId,
        assignee: UserId,
    ) -> Result<Incident> {
        self.policy.require_admin(caller)?;
        let existing = self
            .incidents
            .get_incident(&id)
            .await?
            .ok_or_else(|| IncidentError::not_found("incident"))?;
        self.require_user(assignee).await?;

        let mut after = existing.clone();
        after.assigned_to_id = Some(assignee);
        after.updated_at = Utc::now();
        self.incidents.update_incident(after.clone()).await?;

        let (audit, notify) = tokio::join!(
            self.audit.record(
                AuditAction::Updated,
                id,
                caller.id,
                Some(&existing),
                Some(&after)
            ),
            self.notifier.notify_user(
                assignee,
                NotificationType::IncidentAssigned,
                id,
                &after.title
            ),
        );
        log_side_effect("audit", id, audit);
        log_side_effect("notification", id, notify);

        info!(incident_id = %id, assignee = %assignee, "incident assigned");
        Ok(after)
    }

    /// Hard delete. The DELETED audit entry outlives the row.
    #[instrument(skip_all, fields(caller = %caller.id, incident_id = %id))]
    pub async fn delete(&self, caller: &CallerContext, id: IncidentId) -> Result<()> {
        self.policy.require_admin(caller)?;
        let existing = self
            .incidents
            .get_incident(&id)
            .await?
            .ok_or_else(|| IncidentError::not_found("incident"))?;

        if !self.incidents.delete_incident(&id).await? {
            return Err(IncidentError::not_found("incident"));
        }

        let audit = self
            .audit
            .record(AuditAction::Deleted, id, caller.id, Some(&existing), None)
            .await;
        log_side_effect("audit", id, audit);

        info!(incident_id = %id, "incident deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Audit and notifications
    // ------------------------------------------------------------------

    /// Audit trail of one incident, under the same access rule as `get`.
    pub async fn list_audit(
        &self,
        caller: &CallerContext,
        incident_id: IncidentId,
        page: PageRequest,
    ) -> Result<Page<AuditLogEntry>> {
        self.get(caller, incident_id).await?;
        self.audit
            .list_by_incident(incident_id, page.clamped(self.max_page_size))
            .await
    }

    pub async fn list_notifications(
        &self,
        caller: &CallerContext,
        filter: NotificationFilter,
        page: PageRequest,
    ) -> Result<NotificationPage> {
        self.notifier
            .list(caller.id, filter, page.clamped(self.max_page_size))
            .await
    }

    pub async fn mark_notification_read(
        &self,
        caller: &CallerContext,
        id: NotificationId,
    ) -> Result<Notification> {
        self.notifier.mark_read(id, caller.id).await
    }

    pub async fn mark_all_notifications_read(&self, caller: &CallerContext) -> Result<u64> {
        self.notifier.mark_all_read(caller.id).await
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// CREATED audit plus one admin notification, once per finalized incident.
    async fn after_finalize(&self, caller: &CallerContext, incident: &Incident) {
        let creator_email = match self.users.get_user(&caller.id).await {
            Ok(user) => user.map(|u| u.email),
            Err(error) => {
                warn!(caller = %caller.id, error = %error, "creator lookup failed");
                None
            }
        };

        let (audit, notify) = tokio::join!(
            self.audit.record(
                AuditAction::Created,
                incident.id,
                caller.id,
                None,
                Some(incident)
            ),
            self.notifier.notify_any_admin(
                NotificationType::IncidentCreated,
                incident.id,
                &incident.title,
                creator_email.as_deref(),
            ),
        );
        log_side_effect("audit", incident.id, audit);
        log_side_effect("notification", incident.id, notify);
    }

    async fn notify_assignee(
        &self,
        assignee: Option<UserId>,
        incident: &Incident,
    ) -> Result<Option<Notification>> {
        match assignee {
            Some(assignee) => self
                .notifier
                .notify_user(
                    assignee,
                    NotificationType::IncidentAssigned,
                    incident.id,
                    &incident.title,
                )
                .await
                .map(Some),
            None => Ok(None),
        }
    }

    /// Admin-supplied assignees must exist.
    async fn check_assignee_settable(
        &self,
        caller: &CallerContext,
        fields: &IncidentFields,
    ) -> Result<()> {
        match fields.assigned_to_id {
            Some(Some(assignee)) if caller.is_admin() => self.require_user(assignee).await,
            _ => Ok(()),
        }
    }

    async fn require_user(&self, id: UserId) -> Result<()> {
        match self.users.get_user(&id).await? {
            Some(_) => Ok(()),
            None => Err(IncidentError::not_found("user")),
        }
    }
}

fn log_side_effect<T>(side_effect: &'static str, incident_id: IncidentId, result: Result<T>) {
    if let Err(error) = result {
        warn!(
            incident_id = %incident_id,
            side_effect,
            error = %error,
            "side effect failed after committed write"
        );
    }
}

/// Builder for [`IncidentService`] with individually injected stores.
#[derive(Default)]
pub struct IncidentServiceBuilder {
    incidents: Option<Arc<dyn IncidentStore>>,
    audit: Option<Arc<dyn AuditStore>>,
    notifications: Option<Arc<dyn NotificationStore>>,
    users: Option<Arc<dyn UserStore>>,
    policy: Option<Arc<dyn AccessPolicy>>,
    max_page_size: Option<u32>,
}

impl IncidentServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use one backend for every store.
    pub fn with_storage<S>(self, storage: Arc<S>) -> Self
    where
        S: IncidentStorage + 'static,
    {
        self.with_incident_store(storage.clone())
            .with_audit_store(storage.clone())
            .with_notification_store(storage.clone())
            .with_user_store(storage)
    }

    pub fn with_incident_store(mut self, store: Arc<dyn IncidentStore>) -> Self {
        self.incidents = Some(store);
        self
    }

    pub fn with_audit_store(mut self, store: Arc<dyn AuditStore>) -> Self {
        self.audit = Some(store);
        self
    }

    pub fn with_notification_store(mut self, store: Arc<dyn NotificationStore>) -> Self {
        self.notifications = Some(store);
        self
    }

    pub fn with_user_store(mut self, store: Arc<dyn UserStore>) -> Self {
        self.users = Some(store);
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn AccessPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn with_max_page_size(mut self, max_page_size: u32) -> Self {
        self.max_page_size = Some(max_page_size);
        self
    }

    pub fn build(self) -> Result<IncidentService> {
        let incidents = self
            .incidents
            .ok_or_else(|| IncidentError::Configuration("incident store required".into()))?;
        let audit = self
            .audit
            .ok_or_else(|| IncidentError::Configuration("audit store required".into()))?;
        let notifications = self.notifications.ok_or_else(|| {
            IncidentError::Configuration("notification store required".into())
        })?;
        let users = self
            .users
            .ok_or_else(|| IncidentError::Configuration("user store required".into()))?;
        let policy = self
            .policy
            .unwrap_or_else(|| Arc::new(AssignmentOwnership::new()));

        Ok(IncidentService::from_parts(
            incidents,
            audit,
            notifications,
            users,
            policy,
            self.max_page_size.unwrap_or(MAX_PAGE_SIZE).max(1),
        ))
    }
}
