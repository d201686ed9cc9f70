//! Configuration validation logic
//!
//! Each section validates itself; `Settings::validate` returns the first
//! failure so the message points at one concrete key.

use crate::config::error::ConfigError;
use crate::config::settings::{
    AcknowledgmentsConfig, CredentialsConfig, DispatchConfig, FcmConfig, FileSettings,
    LoggerSettings, ServerConfig, Settings,
};

/// Valid log levels
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid log formats
const VALID_LOG_FORMATS: &[&str] = &["full", "compact", "json"];

/// Upper bound on retries so a misconfiguration cannot stall a dispatch for hours
const MAX_RETRIES_LIMIT: u32 = 10;

/// Shortest accepted webhook secret
const MIN_SECRET_LEN: usize = 16;

impl ServerConfig {
    /// # Validation Rules
    /// - Host must not be empty
    /// - Port must be between 1 and 65535
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::validation(
                "server.host",
                "Host must not be empty.",
            ));
        }
        if self.port == 0 {
            return Err(ConfigError::validation(
                "server.port",
                "Port must be between 1 and 65535. Please specify a valid port number.",
            ));
        }
        Ok(())
    }
}

impl FileSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.path.trim().is_empty() {
            return Err(ConfigError::validation(
                "logger.file.path",
                "File path is required when file logging is enabled.",
            ));
        }

        if !VALID_LOG_FORMATS.contains(&self.format.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError {
                field: "logger.file.format".to_string(),
                message: format!(
                    "Invalid log format '{}'. Valid formats are: {}",
                    self.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        if self.rotation.max_size == 0 {
            return Err(ConfigError::validation(
                "logger.file.rotation.max_size",
                "Maximum file size must be greater than 0.",
            ));
        }
        if self.rotation.max_files == 0 {
            return Err(ConfigError::validation(
                "logger.file.rotation.max_files",
                "Maximum number of files must be greater than 0.",
            ));
        }

        Ok(())
    }
}

impl LoggerSettings {
    /// # Validation Rules
    /// - Log level must be one of: trace, debug, info, warn, error
    /// - At least one output must be enabled
    /// - File settings must be consistent when file output is enabled
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !VALID_LOG_LEVELS.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError {
                field: "logger.level".to_string(),
                message: format!(
                    "Invalid log level '{}'. Valid levels are: {}",
                    self.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        if !self.console.enabled && !self.file.enabled {
            return Err(ConfigError::validation(
                "logger",
                "At least one output (console or file) must be enabled.",
            ));
        }

        self.file.validate()
    }
}

impl FcmConfig {
    /// # Validation Rules
    /// - Endpoint must be an http(s) URL
    /// - Request timeout must be greater than 0
    /// - Android channel id must not be empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.endpoint.starts_with("https://") || self.endpoint.starts_with("http://")) {
            return Err(ConfigError::validation(
                "fcm.endpoint",
                "Endpoint must start with http:// or https://.",
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::validation(
                "fcm.request_timeout_secs",
                "Request timeout must be greater than 0 seconds.",
            ));
        }
        if self.android_channel_id.trim().is_empty() {
            return Err(ConfigError::validation(
                "fcm.android_channel_id",
                "Android channel id must not be empty.",
            ));
        }
        Ok(())
    }
}

impl CredentialsConfig {
    /// # Validation Rules
    /// - Exactly one of `service_account_path` and `access_token` is set
    /// - Scope must not be empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        let has_key = self
            .service_account_path
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty());
        let has_token = self
            .access_token
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());

        match (has_key, has_token) {
            (true, true) => {
                return Err(ConfigError::credential_source(
                    "credentials.service_account_path and credentials.access_token cannot both be set. \
                     Use a service account for automatic token refresh or a static access token.",
                ));
            }
            (false, false) => {
                return Err(ConfigError::credential_source(
                    "Either credentials.service_account_path or credentials.access_token must be set.",
                ));
            }
            _ => {}
        }

        if self.scope.trim().is_empty() {
            return Err(ConfigError::validation(
                "credentials.scope",
                "OAuth scope must not be empty.",
            ));
        }
        Ok(())
    }
}

impl DispatchConfig {
    /// # Validation Rules
    /// - At most 10 retries
    /// - Initial backoff greater than 0 and not above the maximum backoff
    /// - Multiplier of at least 1.0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::ValidationError {
                field: "dispatch.max_retries".to_string(),
                message: format!("Max retries cannot exceed {}.", MAX_RETRIES_LIMIT),
            });
        }
        if self.initial_backoff_ms == 0 {
            return Err(ConfigError::validation(
                "dispatch.initial_backoff_ms",
                "Initial backoff must be greater than 0 milliseconds.",
            ));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(ConfigError::ValidationError {
                field: "dispatch.max_backoff_ms".to_string(),
                message: format!(
                    "Max backoff ({}ms) cannot be lower than initial backoff ({}ms).",
                    self.max_backoff_ms, self.initial_backoff_ms
                ),
            });
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::validation(
                "dispatch.backoff_multiplier",
                "Backoff multiplier must be a finite number of at least 1.0.",
            ));
        }
        Ok(())
    }
}

impl AcknowledgmentsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(secret) = &self.secret
            && secret.len() < MIN_SECRET_LEN
        {
            return Err(ConfigError::ValidationError {
                field: "acknowledgments.secret".to_string(),
                message: format!(
                    "Webhook secret must be at least {} characters.",
                    MIN_SECRET_LEN
                ),
            });
        }
        Ok(())
    }
}

impl Settings {
    /// Validates every section, returning the first error encountered
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.logger.validate()?;
        self.fcm.validate()?;
        self.credentials.validate()?;
        self.dispatch.validate()?;
        self.acknowledgments.validate()?;

        // A static token carries no project id, so it must come from configuration
        if self.credentials.access_token.is_some() && self.fcm.project_id.trim().is_empty() {
            return Err(ConfigError::validation(
                "fcm.project_id",
                "Project id is required when using a static access token.",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_settings() -> Settings {
        Settings {
            fcm: FcmConfig {
                project_id: "demo".to_string(),
                ..FcmConfig::default()
            },
            credentials: CredentialsConfig {
                access_token: Some("ya29.token".to_string()),
                ..CredentialsConfig::default()
            },
            ..Settings::default()
        }
    }

    fn field_of(err: ConfigError) -> String {
        match err.key() {
            Some(key) => key.to_string(),
            None => panic!("expected a keyed error, got {:?}", err),
        }
    }

    #[test]
    fn test_valid_settings() {
        assert!(valid_settings().validate().is_ok());
    }

    #[test]
    fn test_server_port_zero() {
        let config = ServerConfig {
            port: 0,
            ..Default::default()
        };
        assert_eq!(field_of(config.validate().unwrap_err()), "server.port");
    }

    #[test]
    fn test_logger_invalid_level() {
        let config = LoggerSettings {
            level: "loud".to_string(),
            ..Default::default()
        };
        assert_eq!(field_of(config.validate().unwrap_err()), "logger.level");
    }

    #[test]
    fn test_logger_requires_output() {
        let mut config = LoggerSettings::default();
        config.console.enabled = false;
        assert_eq!(field_of(config.validate().unwrap_err()), "logger");
    }

    #[test]
    fn test_logger_zero_rotation() {
        let mut config = LoggerSettings::default();
        config.file.enabled = true;
        config.file.rotation.max_files = 0;
        assert_eq!(
            field_of(config.validate().unwrap_err()),
            "logger.file.rotation.max_files"
        );
    }

    #[test]
    fn test_fcm_endpoint_scheme() {
        let config = FcmConfig {
            endpoint: "fcm.googleapis.com".to_string(),
            ..Default::default()
        };
        assert_eq!(field_of(config.validate().unwrap_err()), "fcm.endpoint");
    }

    #[test]
    fn test_credentials_mutually_exclusive() {
        let config = CredentialsConfig {
            service_account_path: Some("sa.json".to_string()),
            access_token: Some("ya29.token".to_string()),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::CredentialSource(ref msg) if msg.contains("cannot both be set")
        ));
        assert_eq!(err.key(), Some("credentials"));
    }

    #[test]
    fn test_credentials_required() {
        let config = CredentialsConfig {
            access_token: Some("   ".to_string()),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::CredentialSource(_)));
        assert_eq!(field_of(err), "credentials");
    }

    #[test]
    fn test_dispatch_bounds() {
        let config = DispatchConfig {
            max_retries: 11,
            ..Default::default()
        };
        assert_eq!(
            field_of(config.validate().unwrap_err()),
            "dispatch.max_retries"
        );

        let config = DispatchConfig {
            initial_backoff_ms: 5_000,
            max_backoff_ms: 1_000,
            ..Default::default()
        };
        assert_eq!(
            field_of(config.validate().unwrap_err()),
            "dispatch.max_backoff_ms"
        );

        let config = DispatchConfig {
            backoff_multiplier: 0.5,
            ..Default::default()
        };
        assert_eq!(
            field_of(config.validate().unwrap_err()),
            "dispatch.backoff_multiplier"
        );
    }

    #[test]
    fn test_acknowledgment_secret_length() {
        let config = AcknowledgmentsConfig {
            secret: Some("short".to_string()),
        };
        assert_eq!(
            field_of(config.validate().unwrap_err()),
            "acknowledgments.secret"
        );
        assert!(AcknowledgmentsConfig::default().validate().is_ok());
    }

    #[test]
    fn test_static_token_requires_project_id() {
        let mut settings = valid_settings();
        settings.fcm.project_id = String::new();
        assert_eq!(
            field_of(settings.validate().unwrap_err()),
            "fcm.project_id"
        );

        // A service account key supplies its own project id
        settings.credentials = CredentialsConfig {
            service_account_path: Some("sa.json".to_string()),
            ..Default::default()
        };
        assert!(settings.validate().is_ok());
    }
}
