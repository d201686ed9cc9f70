//! Serve command handler
//!
//! Handles the serve command including dry-run validation and server startup.

use crate::config::settings::Settings;
use crate::server::Server;
use crate::services::Services;

/// Handler for the serve command
pub struct ServeCommandHandler {
    config: Settings,
}

impl ServeCommandHandler {
    /// Create a new serve command handler
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Execute the serve command with optional dry-run support
    ///
    /// # Errors
    /// - Configuration validation errors
    /// - Credential wiring errors
    /// - Server startup errors (if not dry-run)
    pub async fn execute(self, dry_run: bool) -> anyhow::Result<()> {
        if dry_run {
            self.validate_only()?;
            return Ok(());
        }
        Server::new(self.config).run().await
    }

    /// Validates configuration and provider wiring without binding a socket
    ///
    /// No token is requested, so a dry run never calls the network.
    pub fn validate_only(&self) -> anyhow::Result<()> {
        self.config.validate()?;
        println!("✓ Configuration is valid");
        println!("✓ Server would bind to: {}", self.config.server.address());

        let services = Services::from_settings(&self.config)?;
        println!("✓ Credentials configured ({})", services.credentials.name());
        println!(
            "✓ Retry policy: up to {} retries, {}ms to {}ms backoff",
            self.config.dispatch.max_retries,
            self.config.dispatch.initial_backoff_ms,
            self.config.dispatch.max_backoff_ms
        );
        println!("✓ Logger configuration is valid");

        println!("Dry run completed successfully - configuration is ready for deployment");
        Ok(())
    }

    /// Get the configuration
    pub fn config(&self) -> &Settings {
        &self.config
    }
}
