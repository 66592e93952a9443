//! Error types for access checks

use thiserror::Error;

/// Why a caller was turned away.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessDenial {
    /// The target does not exist. Reported ahead of any ownership check.
    #[error("{resource} not found")]
    NotFound { resource: &'static str },

    /// The target exists but the caller may not touch it.
    #[error("access denied: {reason}")]
    Forbidden { reason: String },
}

impl AccessDenial {
    pub fn not_found(resource: &'static str) -> Self {
        AccessDenial::NotFound { resource }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        AccessDenial::Forbidden {
            reason: reason.into(),
        }
    }
}

/// Result type for access checks
pub type Result<T> = std::result::Result<T, AccessDenial>;
