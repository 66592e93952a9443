//! Application state for API handlers

use crate::config::PaginationConfig;
use incident_core::{AdminService, IncidentService};
use incident_types::PageRequest;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Incident lifecycle operations
    pub service: IncidentService,

    /// User management and the tracker-wide audit view
    pub admin: AdminService,

    /// Paging limits
    pub pagination: PaginationConfig,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// Create new application state
    pub fn new(service: IncidentService, pagination: PaginationConfig) -> Self {
        Self {
            admin: service.admin(),
            service,
            pagination,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Page request from optional query parameters, using the configured defaults.
    pub fn page(&self, page: Option<u32>, page_size: Option<u32>) -> PageRequest {
        PageRequest {
            page: page.unwrap_or(1),
            page_size: page_size.unwrap_or(self.pagination.default_page_size),
        }
        .clamped(self.pagination.max_page_size)
    }

    /// Get uptime as a human-readable string
    pub fn uptime(&self) -> String {
        let duration = chrono::Utc::now() - self.started_at;
        let secs = duration.num_seconds();

        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else if secs < 86400 {
            format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
        } else {
            format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
        }
    }
}
