use crate::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use incident_types::{
    AuditAppend, AuditFilter, AuditLogEntry, Incident, IncidentFilter, IncidentId, Notification,
    NotificationFilter, NotificationId, PageRequest, Role, User, UserId,
};

/// Generic query window for paged reads. `limit == 0` means unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryWindow {
    pub limit: usize,
    pub offset: usize,
}

impl QueryWindow {
    pub fn all() -> Self {
        Self::default()
    }
}

impl From<PageRequest> for QueryWindow {
    fn from(page: PageRequest) -> Self {
        Self {
            limit: page.limit(),
            offset: page.offset(),
        }
    }
}

/// Storage interface for incident rows. Holds no business rules beyond
/// the one-draft-per-creator constraint, which must be enforced atomically.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Insert a new row. Fails with `Conflict` when the id is taken or when the
    /// row is a draft and its creator already owns one.
    async fn insert_incident(&self, incident: Incident) -> StorageResult<()>;

    /// Get one incident by id.
    async fn get_incident(&self, id: &IncidentId) -> StorageResult<Option<Incident>>;

    /// The creator's draft row, if any.
    async fn find_draft(&self, creator_id: &UserId) -> StorageResult<Option<Incident>>;

    /// Replace an existing row without changing its lifecycle state.
    ///
    /// The stored `is_draft` must equal the incoming one, otherwise the row
    /// was promoted in the meantime and the write yields `Conflict`. Rows
    /// whose draft flag and status disagree yield `InvariantViolation`.
    async fn update_incident(&self, incident: Incident) -> StorageResult<()>;

    /// Replace a row only while the stored copy is still a draft.
    /// A row that was finalized in the meantime yields `Conflict`.
    async fn promote_draft(&self, incident: Incident) -> StorageResult<()>;

    /// Hard delete. Returns whether a row was removed.
    async fn delete_incident(&self, id: &IncidentId) -> StorageResult<bool>;

    /// List matching rows newest-created first.
    async fn list_incidents(
        &self,
        filter: &IncidentFilter,
        window: QueryWindow,
    ) -> StorageResult<Vec<Incident>>;

    async fn count_incidents(&self, filter: &IncidentFilter) -> StorageResult<u64>;
}

/// Storage interface for append-only audit entries.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append an entry; id, sequence and timestamp are assigned here.
    async fn append_audit(&self, event: AuditAppend) -> StorageResult<AuditLogEntry>;

    /// Read entries newest-first.
    async fn list_audit(
        &self,
        filter: &AuditFilter,
        window: QueryWindow,
    ) -> StorageResult<Vec<AuditLogEntry>>;

    async fn count_audit(&self, filter: &AuditFilter) -> StorageResult<u64>;
}

/// Storage interface for notifications.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert_notification(&self, notification: Notification) -> StorageResult<()>;

    /// Recipient's notifications, unread first, then newest first.
    async fn list_notifications(
        &self,
        recipient_id: &UserId,
        filter: &NotificationFilter,
        window: QueryWindow,
    ) -> StorageResult<Vec<Notification>>;

    async fn count_notifications(
        &self,
        recipient_id: &UserId,
        filter: &NotificationFilter,
    ) -> StorageResult<u64>;

    /// Mark one notification read. `None` when it does not exist or
    /// belongs to someone else.
    async fn mark_read(
        &self,
        id: &NotificationId,
        recipient_id: &UserId,
    ) -> StorageResult<Option<Notification>>;

    /// Mark all of the recipient's unread notifications read; returns how many flipped.
    async fn mark_all_read(&self, recipient_id: &UserId) -> StorageResult<u64>;
}

/// Storage interface for the user directory.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user. Emails are unique case-insensitively (`Conflict`).
    async fn insert_user(&self, user: User) -> StorageResult<()>;

    async fn get_user(&self, id: &UserId) -> StorageResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> StorageResult<Option<User>>;

    /// Earliest-created administrator, if any.
    async fn find_first_admin(&self) -> StorageResult<Option<User>>;

    async fn update_user_role(
        &self,
        id: &UserId,
        role: Role,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<User>;

    /// List users newest-first.
    async fn list_users(&self, window: QueryWindow) -> StorageResult<Vec<User>>;

    async fn count_users(&self) -> StorageResult<u64>;
}

/// Unified storage bundle used by the incident service.
pub trait IncidentStorage:
    IncidentStore + AuditStore + NotificationStore + UserStore + Send + Sync
{
}

impl<T> IncidentStorage for T where
    T: IncidentStore + AuditStore + NotificationStore + UserStore + Send + Sync
{
}
