//! PostgreSQL adapter for incident storage.
//!
//! This adapter is the transactional source-of-truth backend. The
//! one-draft-per-creator rule is a partial unique index, so concurrent
//! draft inserts race inside the database rather than in the service.

use crate::traits::{AuditStore, IncidentStore, NotificationStore, QueryWindow, UserStore};
use crate::error::check_lifecycle;
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use incident_types::{
    normalize_email, AuditAction, AuditAppend, AuditEntryId, AuditFilter, AuditLogEntry, Incident,
    IncidentFilter, IncidentId, Notification, NotificationFilter, NotificationId,
    NotificationType, Role, User, UserId,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};
use std::str::FromStr;
use uuid::Uuid;

const INCIDENT_COLUMNS: &str = "id, title, description, severity, status, is_draft, creator_id, \
     assigned_to_id, created_at, updated_at";
const AUDIT_COLUMNS: &str = "id, sequence, incident_id, actor_id, action, before_snapshot, \
     after_snapshot, created_at";
const NOTIFICATION_COLUMNS: &str =
    "id, recipient_id, incident_id, kind, message, is_read, created_at";
const USER_COLUMNS: &str = "id, email, role, created_at, updated_at";

/// PostgreSQL-backed storage adapter.
#[derive(Clone)]
pub struct PostgresIncidentStorage {
    pool: PgPool,
}

impl PostgresIncidentStorage {
    /// Connect to PostgreSQL and initialize required schema.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with_options(database_url, 10, 5).await
    }

    /// Connect with explicit pool parameters.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to connect postgres: {e}")))?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create adapter from an existing pool.
    pub async fn from_pool(pool: PgPool) -> StorageResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> StorageResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS incidents (
                id UUID PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                severity TEXT NOT NULL,
                status TEXT NOT NULL,
                is_draft BOOLEAN NOT NULL,
                creator_id UUID NOT NULL,
                assigned_to_id UUID,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                CHECK (is_draft = (status = 'DRAFT'))
            )
            "#,
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS incidents_one_draft_per_creator
                ON incidents (creator_id) WHERE is_draft
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS incidents_assigned_to_idx
                ON incidents (assigned_to_id, created_at DESC)
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS incident_audit_log (
                id UUID PRIMARY KEY,
                sequence BIGSERIAL NOT NULL UNIQUE,
                incident_id UUID NOT NULL,
                actor_id UUID NOT NULL,
                action TEXT NOT NULL,
                before_snapshot JSONB,
                after_snapshot JSONB,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS incident_audit_log_incident_idx
                ON incident_audit_log (incident_id, created_at DESC)
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS incident_notifications (
                id UUID PRIMARY KEY,
                recipient_id UUID NOT NULL,
                incident_id UUID,
                kind TEXT NOT NULL,
                message TEXT NOT NULL,
                is_read BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS incident_notifications_recipient_idx
                ON incident_notifications (recipient_id, is_read, created_at DESC)
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS incident_users (
                id UUID PRIMARY KEY,
                email TEXT NOT NULL,
                role TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS incident_users_email_idx
                ON incident_users (lower(email))
            "#,
        ];

        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }

    async fn incident_exists(&self, id: &IncidentId) -> StorageResult<bool> {
        let row = sqlx::query("SELECT 1 AS present FROM incidents WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl IncidentStore for PostgresIncidentStorage {
    async fn insert_incident(&self, incident: Incident) -> StorageResult<()> {
        check_lifecycle(&incident)?;
        sqlx::query(
            r#"
            INSERT INTO incidents
                (id, title, description, severity, status, is_draft, creator_id, assigned_to_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(*incident.id.as_uuid())
        .bind(&incident.title)
        .bind(&incident.description)
        .bind(incident.severity.as_str())
        .bind(incident.status.as_str())
        .bind(incident.is_draft)
        .bind(*incident.creator_id.as_uuid())
        .bind(incident.assigned_to_id.map(|id| *id.as_uuid()))
        .bind(incident.created_at)
        .bind(incident.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;

        Ok(())
    }

    async fn get_incident(&self, id: &IncidentId) -> StorageResult<Option<Incident>> {
        let row = sqlx::query(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(incident_from_row).transpose()
    }

    async fn find_draft(&self, creator_id: &UserId) -> StorageResult<Option<Incident>> {
        let row = sqlx::query(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents WHERE creator_id = $1 AND is_draft"
        ))
        .bind(*creator_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(incident_from_row).transpose()
    }

    async fn update_incident(&self, incident: Incident) -> StorageResult<()> {
        check_lifecycle(&incident)?;
        let result = sqlx::query(
            r#"
            UPDATE incidents
               SET title = $2,
                   description = $3,
                   severity = $4,
                   status = $5,
                   is_draft = $6,
                   assigned_to_id = $7,
                   updated_at = $8
             WHERE id = $1
               AND is_draft = $6
            "#,
        )
        .bind(*incident.id.as_uuid())
        .bind(&incident.title)
        .bind(&incident.description)
        .bind(incident.severity.as_str())
        .bind(incident.status.as_str())
        .bind(incident.is_draft)
        .bind(incident.assigned_to_id.map(|id| *id.as_uuid()))
        .bind(incident.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;

        if result.rows_affected() == 0 {
            if self.incident_exists(&incident.id).await? {
                return Err(StorageError::Conflict(format!(
                    "incident {} changed lifecycle state",
                    incident.id
                )));
            }
            return Err(StorageError::NotFound(format!(
                "incident {} not found",
                incident.id
            )));
        }
        Ok(())
    }

    async fn promote_draft(&self, incident: Incident) -> StorageResult<()> {
        check_lifecycle(&incident)?;
        let result = sqlx::query(
            r#"
            UPDATE incidents
               SET title = $2,
                   description = $3,
                   severity = $4,
                   status = $5,
                   is_draft = $6,
                   assigned_to_id = $7,
                   updated_at = $8
             WHERE id = $1
               AND is_draft
            "#,
        )
        .bind(*incident.id.as_uuid())
        .bind(&incident.title)
        .bind(&incident.description)
        .bind(incident.severity.as_str())
        .bind(incident.status.as_str())
        .bind(incident.is_draft)
        .bind(incident.assigned_to_id.map(|id| *id.as_uuid()))
        .bind(incident.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;

        if result.rows_affected() == 0 {
            if self.incident_exists(&incident.id).await? {
                return Err(StorageError::Conflict(format!(
                    "incident {} is no longer a draft",
                    incident.id
                )));
            }
            return Err(StorageError::NotFound(format!(
                "incident {} not found",
                incident.id
            )));
        }
        Ok(())
    }

    async fn delete_incident(&self, id: &IncidentId) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM incidents WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_incidents(
        &self,
        filter: &IncidentFilter,
        window: QueryWindow,
    ) -> StorageResult<Vec<Incident>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents"
        ));
        push_incident_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id DESC");
        push_window(&mut qb, window)?;

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter().map(incident_from_row).collect()
    }

    async fn count_incidents(&self, filter: &IncidentFilter) -> StorageResult<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS total FROM incidents");
        push_incident_filter(&mut qb, filter);

        let row = qb
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        count_from_row(&row)
    }
}

#[async_trait]
impl AuditStore for PostgresIncidentStorage {
    async fn append_audit(&self, event: AuditAppend) -> StorageResult<AuditLogEntry> {
        let id = AuditEntryId::generate();
        let created_at = Utc::now();

        let row = sqlx::query(
            r#"
            INSERT INTO incident_audit_log
                (id, incident_id, actor_id, action, before_snapshot, after_snapshot, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING sequence
            "#,
        )
        .bind(*id.as_uuid())
        .bind(*event.incident_id.as_uuid())
        .bind(*event.actor_id.as_uuid())
        .bind(event.action.as_str())
        .bind(&event.before)
        .bind(&event.after)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;

        let sequence: i64 = row
            .try_get("sequence")
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(AuditLogEntry {
            id,
            sequence: sequence as u64,
            incident_id: event.incident_id,
            actor_id: event.actor_id,
            action: event.action,
            before_snapshot: event.before,
            after_snapshot: event.after,
            created_at,
        })
    }

    async fn list_audit(
        &self,
        filter: &AuditFilter,
        window: QueryWindow,
    ) -> StorageResult<Vec<AuditLogEntry>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {AUDIT_COLUMNS} FROM incident_audit_log"
        ));
        push_audit_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, sequence DESC");
        push_window(&mut qb, window)?;

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter().map(audit_from_row).collect()
    }

    async fn count_audit(&self, filter: &AuditFilter) -> StorageResult<u64> {
        let mut qb =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS total FROM incident_audit_log");
        push_audit_filter(&mut qb, filter);

        let row = qb
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        count_from_row(&row)
    }
}

#[async_trait]
impl NotificationStore for PostgresIncidentStorage {
    async fn insert_notification(&self, notification: Notification) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO incident_notifications
                (id, recipient_id, incident_id, kind, message, is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(*notification.id.as_uuid())
        .bind(*notification.recipient_id.as_uuid())
        .bind(notification.incident_id.map(|id| *id.as_uuid()))
        .bind(notification.kind.as_str())
        .bind(&notification.message)
        .bind(notification.is_read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;

        Ok(())
    }

    async fn list_notifications(
        &self,
        recipient_id: &UserId,
        filter: &NotificationFilter,
        window: QueryWindow,
    ) -> StorageResult<Vec<Notification>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM incident_notifications"
        ));
        push_notification_filter(&mut qb, recipient_id, filter);
        qb.push(" ORDER BY is_read ASC, created_at DESC");
        push_window(&mut qb, window)?;

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter().map(notification_from_row).collect()
    }

    async fn count_notifications(
        &self,
        recipient_id: &UserId,
        filter: &NotificationFilter,
    ) -> StorageResult<u64> {
        let mut qb =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS total FROM incident_notifications");
        push_notification_filter(&mut qb, recipient_id, filter);

        let row = qb
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        count_from_row(&row)
    }

    async fn mark_read(
        &self,
        id: &NotificationId,
        recipient_id: &UserId,
    ) -> StorageResult<Option<Notification>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE incident_notifications
               SET is_read = TRUE
             WHERE id = $1
               AND recipient_id = $2
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(*id.as_uuid())
        .bind(*recipient_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(notification_from_row).transpose()
    }

    async fn mark_all_read(&self, recipient_id: &UserId) -> StorageResult<u64> {
        let result = sqlx::query(
            "UPDATE incident_notifications SET is_read = TRUE WHERE recipient_id = $1 AND NOT is_read",
        )
        .bind(*recipient_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl UserStore for PostgresIncidentStorage {
    async fn insert_user(&self, user: User) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO incident_users (id, email, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(*user.id.as_uuid())
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;

        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> StorageResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM incident_users WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM incident_users WHERE lower(email) = $1"
        ))
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(user_from_row).transpose()
    }

    async fn find_first_admin(&self) -> StorageResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM incident_users WHERE role = $1 ORDER BY created_at ASC, id ASC LIMIT 1"
        ))
        .bind(Role::Admin.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(user_from_row).transpose()
    }

    async fn update_user_role(
        &self,
        id: &UserId,
        role: Role,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<User> {
        let row = sqlx::query(&format!(
            "UPDATE incident_users SET role = $2, updated_at = $3 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(*id.as_uuid())
        .bind(role.as_str())
        .bind(updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        match row {
            Some(row) => user_from_row(row),
            None => Err(StorageError::NotFound(format!("user {} not found", id))),
        }
    }

    async fn list_users(&self, window: QueryWindow) -> StorageResult<Vec<User>> {
        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM incident_users"));
        qb.push(" ORDER BY created_at DESC, id DESC");
        push_window(&mut qb, window)?;

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter().map(user_from_row).collect()
    }

    async fn count_users(&self) -> StorageResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM incident_users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        count_from_row(&row)
    }
}

fn push_incident_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &IncidentFilter) {
    qb.push(" WHERE TRUE");
    if !filter.include_drafts {
        qb.push(" AND NOT is_draft");
    }
    if let Some(assignee) = filter.assigned_to {
        qb.push(" AND assigned_to_id = ").push_bind(*assignee.as_uuid());
    }
    if let Some(user) = filter.creator_or_assignee {
        qb.push(" AND (creator_id = ")
            .push_bind(*user.as_uuid())
            .push(" OR assigned_to_id = ")
            .push_bind(*user.as_uuid())
            .push(")");
    }
    if let Some(severity) = filter.severity {
        qb.push(" AND severity = ").push_bind(severity.as_str());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", escape_like(search));
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn push_audit_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &AuditFilter) {
    qb.push(" WHERE TRUE");
    if let Some(incident_id) = filter.incident_id {
        qb.push(" AND incident_id = ").push_bind(*incident_id.as_uuid());
    }
    if let Some(actor_id) = filter.actor_id {
        qb.push(" AND actor_id = ").push_bind(*actor_id.as_uuid());
    }
}

fn push_notification_filter(
    qb: &mut QueryBuilder<'_, Postgres>,
    recipient_id: &UserId,
    filter: &NotificationFilter,
) {
    qb.push(" WHERE recipient_id = ")
        .push_bind(*recipient_id.as_uuid());
    if let Some(is_read) = filter.is_read {
        qb.push(" AND is_read = ").push_bind(is_read);
    }
}

fn push_window(qb: &mut QueryBuilder<'_, Postgres>, window: QueryWindow) -> StorageResult<()> {
    if window.limit > 0 {
        qb.push(" LIMIT ").push_bind(to_i64(window.limit)?);
    }
    qb.push(" OFFSET ").push_bind(to_i64(window.offset)?);
    Ok(())
}

/// Escape LIKE metacharacters so the search term matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn incident_from_row(row: PgRow) -> StorageResult<Incident> {
    let severity: String = get(&row, "severity")?;
    let status: String = get(&row, "status")?;
    let assigned_to_id: Option<Uuid> = get(&row, "assigned_to_id")?;

    Ok(Incident {
        id: IncidentId::from_uuid(get(&row, "id")?),
        title: get(&row, "title")?,
        description: get(&row, "description")?,
        severity: parse_column(&severity)?,
        status: parse_column(&status)?,
        is_draft: get(&row, "is_draft")?,
        creator_id: UserId::from_uuid(get(&row, "creator_id")?),
        assigned_to_id: assigned_to_id.map(UserId::from_uuid),
        created_at: get(&row, "created_at")?,
        updated_at: get(&row, "updated_at")?,
    })
}

fn audit_from_row(row: PgRow) -> StorageResult<AuditLogEntry> {
    let sequence: i64 = get(&row, "sequence")?;
    let action: String = get(&row, "action")?;

    Ok(AuditLogEntry {
        id: AuditEntryId::from_uuid(get(&row, "id")?),
        sequence: sequence as u64,
        incident_id: IncidentId::from_uuid(get(&row, "incident_id")?),
        actor_id: UserId::from_uuid(get(&row, "actor_id")?),
        action: AuditAction::from(action),
        before_snapshot: get(&row, "before_snapshot")?,
        after_snapshot: get(&row, "after_snapshot")?,
        created_at: get(&row, "created_at")?,
    })
}

fn notification_from_row(row: PgRow) -> StorageResult<Notification> {
    let incident_id: Option<Uuid> = get(&row, "incident_id")?;
    let kind: String = get(&row, "kind")?;

    Ok(Notification {
        id: NotificationId::from_uuid(get(&row, "id")?),
        recipient_id: UserId::from_uuid(get(&row, "recipient_id")?),
        incident_id: incident_id.map(IncidentId::from_uuid),
        kind: NotificationType::from(kind),
        message: get(&row, "message")?,
        is_read: get(&row, "is_read")?,
        created_at: get(&row, "created_at")?,
    })
}

fn user_from_row(row: PgRow) -> StorageResult<User> {
    let role: String = get(&row, "role")?;

    Ok(User {
        id: UserId::from_uuid(get(&row, "id")?),
        email: get(&row, "email")?,
        role: parse_column(&role)?,
        created_at: get(&row, "created_at")?,
        updated_at: get(&row, "updated_at")?,
    })
}

fn count_from_row(row: &PgRow) -> StorageResult<u64> {
    let total: i64 = get(row, "total")?;
    Ok(total.max(0) as u64)
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> StorageResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StorageError::Backend(format!("column {column}: {e}")))
}

fn parse_column<T>(value: &str) -> StorageResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| StorageError::Serialization(e.to_string()))
}

fn map_sqlx_conflict(err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some("23505") => return StorageError::Conflict(db_err.message().to_string()),
            Some("23514") => {
                return StorageError::InvariantViolation(db_err.message().to_string())
            }
            _ => {}
        }
    }
    StorageError::Backend(err.to_string())
}

fn to_i64(value: usize) -> StorageResult<i64> {
    i64::try_from(value)
        .map_err(|_| StorageError::InvalidInput("window value too large".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("perf"), "perf");
    }
}
