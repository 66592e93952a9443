use incident_types::{Incident, Status};
use thiserror::Error;

/// Result type for incident store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by incident, audit, notification and user stores.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    /// Unique key clash, competing draft, or a lifecycle change raced in.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A row that would break a stored-data invariant, such as a draft flag
    /// disagreeing with the status.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("row encoding error: {0}")]
    Serialization(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Reject incidents whose draft flag and status disagree.
pub(crate) fn check_lifecycle(incident: &Incident) -> StorageResult<()> {
    if incident.is_draft != (incident.status == Status::Draft) {
        return Err(StorageError::InvariantViolation(format!(
            "incident {} has is_draft={} with status {}",
            incident.id, incident.is_draft, incident.status
        )));
    }
    Ok(())
}
