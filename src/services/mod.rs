//! Service layer for business logic operations.
//!
//! Services encapsulate business logic and coordinate between
//! repositories, external providers, and handlers.

pub mod delivery;

pub use delivery::{DeliveryService, Dispatcher, RetryPolicy, StatusReceiver};

use std::sync::Arc;

use crate::config::Settings;
use crate::error::{AppError, AppResult};
use crate::external::{
    CredentialProvider, FcmProvider, MessagingProvider, ServiceAccountCredentialProvider,
    ServiceAccountKey, StaticCredentialProvider, build_http_client,
};
use crate::repositories::Repositories;

/// Aggregates all services for convenient access.
///
/// This struct is designed to be used as Axum application state.
/// Cloning is cheap since everything inside is reference counted.
#[derive(Clone)]
pub struct Services {
    pub deliveries: DeliveryService,
    pub credentials: Arc<dyn CredentialProvider>,
    /// OAuth scope requested for outbound calls
    pub scope: String,
}

impl Services {
    /// Wires services from already constructed providers
    pub fn new(
        repos: Repositories,
        credentials: Arc<dyn CredentialProvider>,
        provider: Arc<dyn MessagingProvider>,
        retry: RetryPolicy,
        scope: impl Into<String>,
    ) -> Self {
        let scope = scope.into();
        let dispatcher = Dispatcher::new(credentials.clone(), provider, repos.attempts.clone(), retry)
            .with_scope(scope.clone());
        Self {
            deliveries: DeliveryService::new(dispatcher, repos.attempts),
            credentials,
            scope,
        }
    }

    /// Builds the HTTP client, credential provider, and FCM provider from settings
    ///
    /// With a service account key, an empty `fcm.project_id` falls back to the
    /// key's own project id.
    pub fn from_settings(settings: &Settings) -> AppResult<Self> {
        let client = build_http_client(settings.fcm.request_timeout()).map_err(|e| {
            AppError::Configuration {
                key: "fcm.request_timeout_secs".to_string(),
                source: e.into(),
            }
        })?;

        let mut fcm = settings.fcm.clone();
        let credentials: Arc<dyn CredentialProvider> = match (
            non_empty(settings.credentials.service_account_path.as_deref()),
            non_empty(settings.credentials.access_token.as_deref()),
        ) {
            (Some(path), None) => {
                let key = ServiceAccountKey::from_file(path).map_err(|e| {
                    AppError::Configuration {
                        key: "credentials.service_account_path".to_string(),
                        source: e.into(),
                    }
                })?;
                if fcm.project_id.trim().is_empty()
                    && let Some(project_id) = key.project_id.clone()
                {
                    fcm.project_id = project_id;
                }
                let provider = ServiceAccountCredentialProvider::new(
                    client.clone(),
                    key,
                    settings.credentials.token_uri.clone(),
                )
                .map_err(|e| AppError::Configuration {
                    key: "credentials.service_account_path".to_string(),
                    source: e.into(),
                })?;
                tracing::info!(token_uri = %provider.token_uri(), "Using service account credentials");
                Arc::new(provider)
            }
            (None, Some(token)) => {
                tracing::info!("Using static access token credentials");
                Arc::new(StaticCredentialProvider::new(token))
            }
            _ => {
                return Err(AppError::Configuration {
                    key: "credentials".to_string(),
                    source: anyhow::anyhow!(
                        "exactly one of service_account_path and access_token must be set"
                    ),
                });
            }
        };

        if fcm.project_id.trim().is_empty() {
            return Err(AppError::Configuration {
                key: "fcm.project_id".to_string(),
                source: anyhow::anyhow!(
                    "project id is neither configured nor present in the service account key"
                ),
            });
        }

        tracing::info!(project_id = %fcm.project_id, endpoint = %fcm.endpoint, "FCM provider configured");
        let provider = Arc::new(FcmProvider::new(client, &fcm));

        Ok(Self::new(
            Repositories::new(),
            credentials,
            provider,
            RetryPolicy::from(&settings.dispatch),
            settings.credentials.scope.clone(),
        ))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CredentialsConfig, FcmConfig};
    use std::io::Write;

    const PRIVATE_KEY: &str = include_str!("../../testdata/test_service_account_key.pem");

    fn key_file(project_id: Option<&str>) -> tempfile::NamedTempFile {
        let mut key = serde_json::json!({
            "type": "service_account",
            "client_email": "herald@test-project.iam.gserviceaccount.com",
            "private_key": PRIVATE_KEY,
            "private_key_id": "key-1",
        });
        if let Some(project_id) = project_id {
            key["project_id"] = serde_json::Value::from(project_id);
        }
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(key.to_string().as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_from_settings_with_static_token() {
        let settings = Settings {
            fcm: FcmConfig {
                project_id: "demo".to_string(),
                ..FcmConfig::default()
            },
            credentials: CredentialsConfig {
                access_token: Some("ya29.static".to_string()),
                ..CredentialsConfig::default()
            },
            ..Settings::default()
        };

        let services = Services::from_settings(&settings).unwrap();
        assert_eq!(services.credentials.name(), "static");
        let token = services.credentials.access_token(&services.scope).await.unwrap();
        assert_eq!(token, "ya29.static");
    }

    #[test]
    fn test_project_id_falls_back_to_key() {
        let file = key_file(Some("key-project"));
        let settings = Settings {
            credentials: CredentialsConfig {
                service_account_path: Some(file.path().display().to_string()),
                ..CredentialsConfig::default()
            },
            ..Settings::default()
        };

        let services = Services::from_settings(&settings).unwrap();
        assert_eq!(services.credentials.name(), "service_account");
    }

    #[test]
    fn test_missing_project_id_is_rejected() {
        let file = key_file(None);
        let settings = Settings {
            credentials: CredentialsConfig {
                service_account_path: Some(file.path().display().to_string()),
                ..CredentialsConfig::default()
            },
            ..Settings::default()
        };

        match Services::from_settings(&settings) {
            Err(AppError::Configuration { key, .. }) => assert_eq!(key, "fcm.project_id"),
            Err(other) => panic!("expected configuration error, got {:?}", other),
            Ok(_) => panic!("expected configuration error"),
        }
    }

    #[test]
    fn test_missing_key_file() {
        let settings = Settings {
            credentials: CredentialsConfig {
                service_account_path: Some("/nonexistent/herald-key.json".to_string()),
                ..CredentialsConfig::default()
            },
            ..Settings::default()
        };

        match Services::from_settings(&settings) {
            Err(AppError::Configuration { key, .. }) => {
                assert_eq!(key, "credentials.service_account_path")
            }
            Err(other) => panic!("expected configuration error, got {:?}", other),
            Ok(_) => panic!("expected configuration error"),
        }
    }
}
