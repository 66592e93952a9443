//! incidentd library
//!
//! This crate wires the incident core to an HTTP surface:
//! - REST API handlers and the caller extractor
//! - Layered configuration
//! - Server lifecycle and admin bootstrap

pub mod api;
pub mod config;
pub mod error;
pub mod server;

pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError};
pub use server::Server;
