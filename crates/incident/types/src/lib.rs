//! # Incident Types
//!
//! Shared domain model for the incident tracker:
//!
//! - [`Incident`] records, partial [`IncidentFields`] payloads and [`IncidentFilter`] predicates
//! - [`AuditLogEntry`] immutable before/after snapshots
//! - [`Notification`] recipient-addressed messages
//! - [`CallerContext`] with a closed [`Role`] enum, resolved once per request
//! - [`PageRequest`] / [`Page`] pagination contract

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

pub mod audit;
pub mod caller;
pub mod ids;
pub mod incident;
pub mod notification;
pub mod page;
pub mod user;

pub use audit::{AuditAction, AuditAppend, AuditFilter, AuditLogEntry};
pub use caller::{CallerContext, Role};
pub use ids::{AuditEntryId, IncidentId, NotificationId, ParseIdError, UserId};
pub use incident::{
    Incident, IncidentField, IncidentFields, IncidentFilter, IncidentQuery, Severity, Status,
};
pub use notification::{Notification, NotificationFilter, NotificationType};
pub use page::{Page, PageRequest, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use user::{normalize_email, User};

/// Error returned when parsing one of the closed enums from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
