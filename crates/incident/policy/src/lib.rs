//! Incident access policy
//!
//! Decides, per request, whether a caller may see or mutate an incident:
//!
//! - **Ownership mode** for a specific incident (get, update, audit view)
//! - **List mode** for collection queries, expressed as a store filter
//!
//! Existence is always checked before ownership, so a missing incident is
//! `NotFound` for every caller.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

pub mod decision;
pub mod error;
pub mod policy;

pub use decision::{AccessDecision, AccessMode};
pub use error::{AccessDenial, Result};
pub use policy::{AccessPolicy, AssignmentOwnership};
