//! Incident core error types

use incident_policy::AccessDenial;
use incident_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the incident core
#[derive(Debug, Error)]
pub enum IncidentError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("storage error: {0}")]
    Storage(#[source] StorageError),
}

impl IncidentError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        IncidentError::NotFound(resource.into())
    }

    pub fn bad_request(reason: impl Into<String>) -> Self {
        IncidentError::BadRequest(reason.into())
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        IncidentError::Forbidden(reason.into())
    }
}

impl From<StorageError> for IncidentError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(message) => IncidentError::NotFound(message),
            StorageError::Conflict(message) => IncidentError::Conflict(message),
            StorageError::InvalidInput(message) => IncidentError::BadRequest(message),
            other => IncidentError::Storage(other),
        }
    }
}

impl From<AccessDenial> for IncidentError {
    fn from(denial: AccessDenial) -> Self {
        match denial {
            AccessDenial::NotFound { resource } => IncidentError::NotFound(resource.to_string()),
            AccessDenial::Forbidden { reason } => IncidentError::Forbidden(reason),
        }
    }
}

/// Result type for incident core operations
pub type Result<T> = std::result::Result<T, IncidentError>;
