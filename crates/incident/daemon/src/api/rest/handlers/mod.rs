//! API request handlers

mod admin;
mod health;
mod incidents;
mod notifications;

pub use admin::*;
pub use health::*;
pub use incidents::*;
pub use notifications::*;
