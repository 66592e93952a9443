//! Access policy contract and the assignment-based implementation.

use crate::decision::{AccessDecision, AccessMode};
use crate::error::{AccessDenial, Result};
use incident_types::{CallerContext, Incident, IncidentFilter, IncidentQuery};
use tracing::debug;

/// Pure decision function over (caller, incident).
///
/// Implementations must not perform I/O; the service fetches the incident
/// and hands it over.
pub trait AccessPolicy: Send + Sync + std::fmt::Debug {
    /// Stable identifier reported in denials
    fn id(&self) -> &str;

    /// Decide whether `caller` may access `incident` in `mode`.
    fn can_access(
        &self,
        caller: &CallerContext,
        incident: &Incident,
        mode: AccessMode,
    ) -> AccessDecision;

    /// Turn caller-supplied list filters into the store predicate the caller
    /// is allowed to see.
    fn list_scope(&self, caller: &CallerContext, query: &IncidentQuery) -> IncidentFilter;

    /// Existence first, then ownership.
    fn authorize(
        &self,
        caller: &CallerContext,
        incident: Option<&Incident>,
        mode: AccessMode,
    ) -> Result<()> {
        let incident = incident.ok_or_else(|| AccessDenial::not_found("incident"))?;
        match self.can_access(caller, incident, mode) {
            AccessDecision::Allow => Ok(()),
            AccessDecision::Deny { reason, policy_id } => {
                debug!(
                    caller = %caller.id,
                    incident_id = %incident.id,
                    policy = %policy_id,
                    reason = %reason,
                    "access denied"
                );
                Err(AccessDenial::forbidden(reason))
            }
        }
    }

    /// Gate for admin-only operations.
    fn require_admin(&self, caller: &CallerContext) -> Result<()> {
        if caller.is_admin() {
            Ok(())
        } else {
            Err(AccessDenial::forbidden("administrator role required"))
        }
    }
}

/// Admins see everything; everyone else sees what is assigned to them.
///
/// Creatorship alone grants nothing: a user who files an incident and then
/// has it reassigned loses access to it.
#[derive(Debug, Clone, Default)]
pub struct AssignmentOwnership;

impl AssignmentOwnership {
    pub const ID: &'static str = "assignment-ownership";

    pub fn new() -> Self {
        Self
    }
}

impl AccessPolicy for AssignmentOwnership {
    fn id(&self) -> &str {
        Self::ID
    }

    fn can_access(
        &self,
        caller: &CallerContext,
        incident: &Incident,
        mode: AccessMode,
    ) -> AccessDecision {
        if caller.is_admin() {
            return AccessDecision::allow();
        }
        if incident.assigned_to_id == Some(caller.id) {
            return AccessDecision::allow();
        }
        let reason = match mode {
            AccessMode::Ownership => "incident is not assigned to the caller",
            AccessMode::List => "incident is outside the caller's list scope",
        };
        AccessDecision::deny(reason, self.id())
    }

    fn list_scope(&self, caller: &CallerContext, query: &IncidentQuery) -> IncidentFilter {
        let filter = IncidentFilter::new()
            .with_severity(query.severity)
            .with_status(query.status)
            .with_search(query.search.as_deref());

        if caller.is_admin() {
            match query.user_id {
                Some(user) => filter.involving(user),
                None => filter,
            }
        } else {
            filter.assigned_to(caller.id)
        }
    }
}
