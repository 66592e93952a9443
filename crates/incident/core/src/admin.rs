//! Administrator operations: user management and the tracker-wide audit view.

use crate::audit::AuditRecorder;
use crate::error::{IncidentError, Result};
use chrono::Utc;
use incident_policy::AccessPolicy;
use incident_storage::{QueryWindow, StorageError, UserStore};
use incident_types::{
    AuditFilter, AuditLogEntry, CallerContext, Page, PageRequest, Role, User, UserId,
};
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Clone)]
pub struct AdminService {
    users: Arc<dyn UserStore>,
    audit: AuditRecorder,
    policy: Arc<dyn AccessPolicy>,
    max_page_size: u32,
}

impl AdminService {
    pub fn new(
        users: Arc<dyn UserStore>,
        audit: AuditRecorder,
        policy: Arc<dyn AccessPolicy>,
        max_page_size: u32,
    ) -> Self {
        Self {
            users,
            audit,
            policy,
            max_page_size,
        }
    }

    /// Register a user. Emails are unique case-insensitively.
    #[instrument(skip_all, fields(caller = %caller.id, role = %role))]
    pub async fn create_user(
        &self,
        caller: &CallerContext,
        email: &str,
        role: Role,
    ) -> Result<User> {
        self.policy.require_admin(caller)?;
        self.insert_user(email, role).await
    }

    #[instrument(skip_all, fields(caller = %caller.id, user_id = %user_id, role = %role))]
    pub async fn update_user_role(
        &self,
        caller: &CallerContext,
        user_id: UserId,
        role: Role,
    ) -> Result<User> {
        self.policy.require_admin(caller)?;
        let user = self
            .users
            .update_user_role(&user_id, role, Utc::now())
            .await
            .map_err(|err| match err {
                StorageError::NotFound(_) => IncidentError::not_found("user"),
                other => other.into(),
            })?;

        info!(user_id = %user.id, role = %user.role, "user role changed");
        Ok(user)
    }

    /// Users, newest first.
    pub async fn list_users(&self, caller: &CallerContext, page: PageRequest) -> Result<Page<User>> {
        self.policy.require_admin(caller)?;
        let page = page.clamped(self.max_page_size);
        let (data, total) = tokio::try_join!(
            self.users.list_users(QueryWindow::from(page)),
            self.users.count_users(),
        )?;
        Ok(Page::new(data, total, page))
    }

    /// Admins may read anyone; users only themselves.
    pub async fn get_user(&self, caller: &CallerContext, user_id: UserId) -> Result<User> {
        if !caller.is_admin() && caller.id != user_id {
            return Err(IncidentError::forbidden("cannot read another user"));
        }
        self.users
            .get_user(&user_id)
            .await?
            .ok_or_else(|| IncidentError::not_found("user"))
    }

    /// Audit entries across all incidents, newest first.
    pub async fn list_audit(
        &self,
        caller: &CallerContext,
        filter: AuditFilter,
        page: PageRequest,
    ) -> Result<Page<AuditLogEntry>> {
        self.policy.require_admin(caller)?;
        self.audit
            .list_all(filter, page.clamped(self.max_page_size))
            .await
    }

    /// Create an administrator with `email` unless that email is taken.
    /// Returns the existing or new user and whether it was created.
    pub async fn ensure_admin(&self, email: &str) -> Result<(User, bool)> {
        if let Some(existing) = self.users.find_user_by_email(email).await? {
            return Ok((existing, false));
        }
        let user = self.insert_user(email, Role::Admin).await?;
        Ok((user, true))
    }

    async fn insert_user(&self, email: &str, role: Role) -> Result<User> {
        let email = validate_email(email)?;
        let user = User::new(email, role, Utc::now());
        self.users.insert_user(user.clone()).await?;

        info!(user_id = %user.id, role = %user.role, "user created");
        Ok(user)
    }
}

/// Trimmed email, rejecting blanks and anything not shaped `local@domain.tld`.
fn validate_email(email: &str) -> Result<String> {
    let email = email.trim();
    if email.is_empty() {
        return Err(IncidentError::bad_request("email is required"));
    }
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(IncidentError::bad_request(format!("invalid email: {email}")));
    }
    Ok(email.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use incident_policy::AssignmentOwnership;
    use incident_storage::InMemoryIncidentStorage;

    fn admin_service() -> AdminService {
        let storage = Arc::new(InMemoryIncidentStorage::new());
        AdminService::new(
            storage.clone(),
            AuditRecorder::new(storage),
            Arc::new(AssignmentOwnership::new()),
            100,
        )
    }

    #[test]
    fn test_validate_email() {
        assert_eq!(
            validate_email(" ops@example.com ").unwrap(),
            "ops@example.com"
        );
        for bad in ["", "   ", "no-at-sign", "@example.com", "a@b", "a@@b.com", "a b@c.com"] {
            assert!(
                matches!(validate_email(bad), Err(IncidentError::BadRequest(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let service = admin_service();
        let admin = CallerContext::admin(UserId::generate());

        service
            .create_user(&admin, "ops@example.com", Role::User)
            .await
            .unwrap();
        let result = service.create_user(&admin, "OPS@example.com", Role::User).await;
        assert!(matches!(result, Err(IncidentError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_user_management_requires_admin() {
        let service = admin_service();
        let user = CallerContext::user(UserId::generate());

        let result = service.create_user(&user, "x@example.com", Role::User).await;
        assert!(matches!(result, Err(IncidentError::Forbidden(_))));
        let result = service.list_users(&user, PageRequest::default()).await;
        assert!(matches!(result, Err(IncidentError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_update_role_of_missing_user_is_not_found() {
        let service = admin_service();
        let admin = CallerContext::admin(UserId::generate());
        let result = service
            .update_user_role(&admin, UserId::generate(), Role::Admin)
            .await;
        assert!(matches!(result, Err(IncidentError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_user_self_or_admin() {
        let service = admin_service();
        let admin = CallerContext::admin(UserId::generate());
        let created = service
            .create_user(&admin, "u1@example.com", Role::User)
            .await
            .unwrap();
        let me = CallerContext::user(created.id);

        assert_eq!(service.get_user(&me, created.id).await.unwrap().id, created.id);
        assert_eq!(service.get_user(&admin, created.id).await.unwrap().id, created.id);
        let other = CallerContext::user(UserId::generate());
        assert!(matches!(
            service.get_user(&other, created.id).await,
            Err(IncidentError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let service = admin_service();
        let (first, created) = service.ensure_admin("root@example.com").await.unwrap();
        assert!(created);
        assert!(first.is_admin());

        let (second, created) = service.ensure_admin("ROOT@example.com").await.unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
    }
}
