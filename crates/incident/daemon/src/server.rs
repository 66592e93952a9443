//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::{DaemonConfig, StorageConfig};
use crate::error::{DaemonError, DaemonResult};
use incident_core::IncidentService;
use incident_storage::InMemoryIncidentStorage;
use std::sync::Arc;
use tokio::net::TcpListener;

/// incidentd server
pub struct Server {
    config: DaemonConfig,
    state: AppState,
}

impl Server {
    /// Connect storage, seed the bootstrap admin and prepare the API state.
    pub async fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let service = build_service(&config).await?;
        let state = AppState::new(service, config.pagination.clone());

        if let Some(email) = config.bootstrap.admin_email.as_deref() {
            let (admin, created) = state.admin.ensure_admin(email).await?;
            if created {
                tracing::info!(user_id = %admin.id, email = %admin.email, "bootstrap admin created");
            } else {
                tracing::debug!(user_id = %admin.id, "bootstrap admin already present");
            }
        }

        Ok(Self { config, state })
    }

    /// Shared API state, for embedding the router elsewhere.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server until a shutdown signal arrives.
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;
        let app = create_router(self.state, &self.config.server);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "incidentd listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("incidentd shut down");
        Ok(())
    }
}

async fn build_service(config: &DaemonConfig) -> DaemonResult<IncidentService> {
    let builder =
        IncidentService::builder().with_max_page_size(config.pagination.max_page_size);

    let builder = match &config.storage {
        StorageConfig::Memory => {
            tracing::warn!("using in-memory storage; data is lost on restart");
            builder.with_storage(Arc::new(InMemoryIncidentStorage::new()))
        }
        #[cfg(feature = "postgres")]
        StorageConfig::Postgres {
            url,
            max_connections,
            connect_timeout_secs,
        } => {
            let storage = incident_storage::postgres::PostgresIncidentStorage::connect_with_options(
                url,
                *max_connections,
                *connect_timeout_secs,
            )
            .await?;
            tracing::info!(max_connections, "connected to postgres");
            builder.with_storage(Arc::new(storage))
        }
        #[cfg(not(feature = "postgres"))]
        StorageConfig::Postgres { .. } => {
            return Err(DaemonError::Config(
                "postgres storage requires building with the `postgres` feature".to_string(),
            ));
        }
    };

    Ok(builder.build()?)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bootstrap_admin_is_seeded_once() {
        let mut config = DaemonConfig::default();
        config.bootstrap.admin_email = Some("root@example.com".to_string());

        let server = Server::new(config).await.unwrap();
        let (admin, created) = server
            .state()
            .admin
            .ensure_admin("root@example.com")
            .await
            .unwrap();
        assert!(!created);
        assert!(admin.is_admin());
    }

    #[cfg(not(feature = "postgres"))]
    #[tokio::test]
    async fn test_postgres_without_feature_is_a_config_error() {
        let mut config = DaemonConfig::default();
        config.storage = StorageConfig::Postgres {
            url: "postgres://localhost/incidents".to_string(),
            max_connections: 1,
            connect_timeout_secs: 1,
        };
        assert!(matches!(
            Server::new(config).await,
            Err(DaemonError::Config(_))
        ));
    }
}
