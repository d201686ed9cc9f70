//! Token command handler
//!
//! Fetches one access token with the configured credentials and prints a
//! masked summary, so operators can verify credentials without a send.

use crate::config::settings::Settings;
use crate::error::AppResult;
use crate::external::credentials::mask_token;
use crate::services::Services;

/// Handler for the token command
pub struct TokenCommandHandler {
    config: Settings,
}

impl TokenCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Obtains a token and returns its masked form after printing it
    pub async fn execute(&self) -> AppResult<String> {
        let services = Services::from_settings(&self.config)?;
        let token = services.credentials.access_token(&services.scope).await?;
        let masked = mask_token(&token);

        println!("✓ Credentials: {}", services.credentials.name());
        println!("✓ Scope: {}", services.scope);
        println!("✓ Access token: {}", masked);
        Ok(masked)
    }
}
