//! Application state for Axum web framework.
//!
//! Contains shared services and resources that are accessible
//! across all request handlers.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::error::AppResult;
use crate::services::Services;

/// Application state containing all shared services and resources.
///
/// Cloning is cheap since every field is reference counted.
#[derive(Clone)]
pub struct AppState {
    /// All business logic services
    pub services: Services,
    /// Loaded configuration
    pub settings: Arc<Settings>,
    /// Fired when the server starts shutting down
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Creates state from already built services
    pub fn new(services: Services, settings: Settings) -> Self {
        Self {
            services,
            settings: Arc::new(settings),
            shutdown: CancellationToken::new(),
        }
    }

    /// Builds services from settings and wraps them in application state
    ///
    /// # Errors
    /// Configuration errors from credential or provider setup
    pub fn from_settings(settings: Settings) -> AppResult<Self> {
        let services = Services::from_settings(&settings)?;
        Ok(Self::new(services, settings))
    }
}
