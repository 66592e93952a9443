//! Incident tracker storage abstractions.
//!
//! This crate defines the persistence contract for the incident core:
//! - incident rows (primary key access + predicate scans)
//! - append-only audit entries
//! - recipient-addressed notifications
//! - the user directory used for admin fan-out and user management
//!
//! Design stance:
//! - Stores own no business rules; the one-draft-per-creator constraint is the
//!   single exception and must be enforced atomically by every adapter.
//! - The in-memory adapter is the reference implementation and test fake.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::InMemoryIncidentStorage;
pub use traits::{
    AuditStore, IncidentStorage, IncidentStore, NotificationStore, QueryWindow, UserStore,
};
