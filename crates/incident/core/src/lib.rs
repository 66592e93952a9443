//! # Incident Core
//!
//! Lifecycle and access-control core of the incident tracker.
//!
//! - [`DraftReconciler`]: one draft per creator, merged on autosave and
//!   promoted exactly once
//! - [`AuditRecorder`]: immutable before/after snapshots
//! - [`NotificationDispatcher`]: templated, recipient-addressed messages
//! - [`IncidentService`]: authorizes, writes, then runs audit and
//!   notification side effects best-effort
//! - [`AdminService`]: user management and the tracker-wide audit view
//!
//! ```ignore
//! let storage = Arc::new(InMemoryIncidentStorage::new());
//! let service = IncidentService::with_storage(storage);
//! let draft = service.auto_save(&caller, IncidentFields::default().with_title("X")).await?;
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

pub mod admin;
pub mod audit;
pub mod drafts;
pub mod error;
pub mod notify;
pub mod service;

pub use admin::AdminService;
pub use audit::AuditRecorder;
pub use drafts::{DraftReconciler, SaveOutcome};
pub use error::{IncidentError, Result};
pub use notify::{render_message, MessageArgs, NotificationDispatcher, NotificationPage};
pub use service::{IncidentService, IncidentServiceBuilder};
