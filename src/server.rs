//! Server module for managing HTTP server lifecycle
//!
//! This module handles server initialization, startup, and graceful shutdown.

use crate::api::routes::create_router;
use crate::config::{Environment, Settings};
use crate::state::AppState;
use tokio::net::TcpListener;
use tokio::signal;

/// HTTP server manager
pub struct Server {
    settings: Settings,
}

impl Server {
    /// Create a new server with the given settings
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Start the server and run until shutdown signal
    ///
    /// This method:
    /// 1. Logs startup information
    /// 2. Builds credential and messaging providers
    /// 3. Binds to configured address
    /// 4. Serves until Ctrl+C or SIGTERM, then cancels pending dispatches
    ///
    /// # Errors
    /// - Credential or provider configuration errors
    /// - Address binding errors
    /// - Server runtime errors
    pub async fn run(self) -> anyhow::Result<()> {
        tracing::info!(
            app_name = %self.settings.application.name,
            app_version = %self.settings.application.version,
            environment = %Environment::from_env(),
            "Application starting"
        );

        tracing::info!(
            host = %self.settings.server.host,
            port = %self.settings.server.port,
            "Server configuration loaded"
        );

        // Secrets are only reported as present or absent
        tracing::info!(
            endpoint = %self.settings.fcm.endpoint,
            project_id = %self.settings.fcm.project_id,
            service_account = self.settings.credentials.service_account_path.is_some(),
            static_token = self.settings.credentials.access_token.is_some(),
            webhook_secret = self.settings.acknowledgments.secret.is_some(),
            "Delivery configuration loaded"
        );

        tracing::info!(
            max_retries = self.settings.dispatch.max_retries,
            initial_backoff_ms = self.settings.dispatch.initial_backoff_ms,
            max_backoff_ms = self.settings.dispatch.max_backoff_ms,
            "Retry policy loaded"
        );

        let address = self.settings.server.address();
        let state = AppState::from_settings(self.settings)?;
        tracing::info!("Application state created");

        let router = create_router(state.clone());

        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!(error = %e, address = %address, "Failed to bind to address");
            anyhow::anyhow!("Failed to bind to {}: {}", address, e)
        })?;

        tracing::info!(address = %address, "Server listening");

        let shutdown_state = state.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                shutdown_state.shutdown.cancel();
                shutdown_state.services.deliveries.shutdown();
            })
            .await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
///
/// If a signal handler cannot be installed, that branch never completes and
/// the other signal still works.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
