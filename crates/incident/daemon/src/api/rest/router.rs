//! API Router configuration

use super::handlers;
use super::state::AppState;
use crate::config::ServerConfig;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    let api_routes = Router::new()
        // Health
        .route("/health", get(handlers::health_check))
        // Incidents
        .route(
            "/incidents",
            get(handlers::list_incidents).post(handlers::create_incident),
        )
        .route(
            "/incidents/draft",
            get(handlers::get_draft).delete(handlers::delete_draft),
        )
        .route("/incidents/all", get(handlers::list_all_incidents))
        .route("/incidents/auto-save", post(handlers::auto_save))
        .route(
            "/incidents/:id",
            get(handlers::get_incident)
                .patch(handlers::update_incident)
                .delete(handlers::delete_incident),
        )
        .route("/incidents/:id/assign", patch(handlers::assign_incident))
        .route("/incidents/:id/audit", get(handlers::incident_audit))
        // Notifications
        .route("/notifications", get(handlers::list_notifications))
        .route(
            "/notifications/read-all",
            patch(handlers::mark_all_notifications_read),
        )
        .route(
            "/notifications/:id/read",
            patch(handlers::mark_notification_read),
        )
        // Admin
        .route(
            "/admin/users",
            get(handlers::list_users).post(handlers::create_user),
        )
        .route("/admin/users/:id/role", patch(handlers::update_user_role))
        .route("/admin/audit", get(handlers::list_audit_log))
        .route(
            "/admin/audit/:incident_id",
            get(handlers::incident_audit_log),
        );

    // Build router with middleware
    let router = Router::new()
        .nest("/api/v1", api_routes)
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http());

    let router = if config.enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}
