//! Configuration settings structures for herald-rs
//!
//! This module defines all configuration structures that can be loaded from
//! TOML files and environment variables.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;
use crate::external::credentials::MESSAGING_SCOPE;
use crate::logger::{ConsoleConfig, FileConfig, LogFormat, LoggerConfig, RotationConfig};

// ============================================================================
// Default value functions
// ============================================================================

fn default_app_name() -> String {
    "herald-rs".to_string()
}

fn default_app_version() -> String {
    crate::pkg_version().to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_path() -> String {
    "logs/herald.log".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_max_size() -> u64 {
    10 * 1024 * 1024 // 10MB
}

fn default_max_files() -> usize {
    5
}

fn default_fcm_endpoint() -> String {
    "https://fcm.googleapis.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_android_channel_id() -> String {
    "default".to_string()
}

fn default_title() -> String {
    "Notification".to_string()
}

fn default_body() -> String {
    "You have a new notification".to_string()
}

fn default_scope() -> String {
    MESSAGING_SCOPE.to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// ============================================================================
// Application Configuration
// ============================================================================

/// Application basic information configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default = "default_app_name")]
    pub name: String,

    #[serde(default = "default_app_version")]
    pub version: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
        }
    }
}

// ============================================================================
// Server Configuration
// ============================================================================

/// Axum HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    /// Get the full server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

// ============================================================================
// Logger Settings
// ============================================================================

/// Console output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub colored: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            colored: default_true(),
        }
    }
}

/// Size-based rotation settings for file logging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationSettings {
    /// Maximum file size in bytes before rotation
    #[serde(default = "default_max_size")]
    pub max_size: u64,

    /// Maximum number of rotated files to keep
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            max_files: default_max_files(),
        }
    }
}

/// File output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_path")]
    pub path: String,

    #[serde(default = "default_true")]
    pub append: bool,

    /// Log format: "full", "compact", or "json"
    #[serde(default = "default_log_format")]
    pub format: String,

    #[serde(default)]
    pub rotation: RotationSettings,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_log_path(),
            append: default_true(),
            format: default_log_format(),
            rotation: RotationSettings::default(),
        }
    }
}

/// Logger configuration as it appears in configuration files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub console: ConsoleSettings,

    #[serde(default)]
    pub file: FileSettings,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console: ConsoleSettings::default(),
            file: FileSettings::default(),
        }
    }
}

impl LoggerSettings {
    /// Converts the file representation into the runtime `LoggerConfig`
    pub fn into_logger_config(self) -> Result<LoggerConfig, ConfigError> {
        let console = ConsoleConfig::new(self.console.enabled, self.console.colored);
        let file = self.file.into_file_config()?;

        LoggerConfig::new(console, file, self.level).map_err(|e| ConfigError::ValidationError {
            field: "logger".to_string(),
            message: e.to_string(),
        })
    }
}

impl FileSettings {
    pub fn into_file_config(self) -> Result<FileConfig, ConfigError> {
        let format = self
            .format
            .parse::<LogFormat>()
            .map_err(|e| ConfigError::ValidationError {
                field: "logger.file.format".to_string(),
                message: e.to_string(),
            })?;
        let rotation = RotationConfig::new(self.rotation.max_size, self.rotation.max_files)
            .map_err(|e| ConfigError::ValidationError {
                field: "logger.file.rotation".to_string(),
                message: e.to_string(),
            })?;

        FileConfig::new(
            self.enabled,
            PathBuf::from(self.path),
            self.append,
            format,
            rotation,
        )
        .map_err(|e| ConfigError::ValidationError {
            field: "logger.file".to_string(),
            message: e.to_string(),
        })
    }
}

// ============================================================================
// FCM Configuration
// ============================================================================

/// FCM HTTP v1 provider configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FcmConfig {
    /// Firebase project id; taken from the service account key when empty
    #[serde(default)]
    pub project_id: String,

    #[serde(default = "default_fcm_endpoint")]
    pub endpoint: String,

    /// Timeout for a single outbound request, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_android_channel_id")]
    pub android_channel_id: String,

    /// Notification title used when the payload carries none
    #[serde(default = "default_title")]
    pub default_title: String,

    /// Notification body used when the payload carries none
    #[serde(default = "default_body")]
    pub default_body: String,
}

impl FcmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for FcmConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            endpoint: default_fcm_endpoint(),
            request_timeout_secs: default_request_timeout_secs(),
            android_channel_id: default_android_channel_id(),
            default_title: default_title(),
            default_body: default_body(),
        }
    }
}

// ============================================================================
// Credentials Configuration
// ============================================================================

/// Access token source for the messaging API
///
/// Exactly one of `service_account_path` and `access_token` must be set.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Service account JSON key used for the OAuth JWT bearer exchange
    #[serde(default)]
    pub service_account_path: Option<String>,

    /// Pre-issued bearer token
    #[serde(default)]
    pub access_token: Option<String>,

    /// Overrides the token endpoint named in the key file
    #[serde(default)]
    pub token_uri: Option<String>,

    #[serde(default = "default_scope")]
    pub scope: String,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("service_account_path", &self.service_account_path)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<redacted>"),
            )
            .field("token_uri", &self.token_uri)
            .field("scope", &self.scope)
            .finish()
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            service_account_path: None,
            access_token: None,
            token_uri: None,
            scope: default_scope(),
        }
    }
}

// ============================================================================
// Dispatch Configuration
// ============================================================================

/// Retry behavior for transient provider failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Retries after the first provider call; network failures only
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Randomize each delay by up to ±50%
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_true(),
        }
    }
}

// ============================================================================
// Acknowledgments Configuration
// ============================================================================

/// Inbound acknowledgment webhook configuration
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcknowledgmentsConfig {
    /// Shared bearer secret required on the webhook when set
    #[serde(default)]
    pub secret: Option<String>,
}

impl std::fmt::Debug for AcknowledgmentsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcknowledgmentsConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ============================================================================
// Main Settings Structure
// ============================================================================

/// Complete application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logger: LoggerSettings,

    #[serde(default)]
    pub fcm: FcmConfig,

    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub acknowledgments: AcknowledgmentsConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // ========================================================================
    // Arbitrary implementations for property-based testing
    // ========================================================================

    fn arb_application_config() -> impl Strategy<Value = ApplicationConfig> {
        (
            "[a-z][a-z0-9-]{0,20}",
            "[0-9]{1,2}\\.[0-9]{1,2}\\.[0-9]{1,2}",
        )
            .prop_map(|(name, version)| ApplicationConfig { name, version })
    }

    fn arb_server_config() -> impl Strategy<Value = ServerConfig> {
        (
            prop_oneof![
                Just("127.0.0.1".to_string()),
                Just("0.0.0.0".to_string()),
                Just("localhost".to_string()),
            ],
            1u16..=65535u16,
        )
            .prop_map(|(host, port)| ServerConfig { host, port })
    }

    fn arb_logger_settings() -> impl Strategy<Value = LoggerSettings> {
        (
            prop_oneof![
                Just("trace".to_string()),
                Just("info".to_string()),
                Just("error".to_string()),
            ],
            any::<bool>(),
            any::<bool>(),
            prop_oneof![
                Just("json".to_string()),
                Just("full".to_string()),
                Just("compact".to_string()),
            ],
            1024u64..=100_000_000u64,
            1usize..=20usize,
        )
            .prop_map(
                |(level, console_enabled, file_enabled, format, max_size, max_files)| {
                    LoggerSettings {
                        level,
                        console: ConsoleSettings {
                            enabled: console_enabled,
                            colored: true,
                        },
                        file: FileSettings {
                            enabled: file_enabled,
                            path: "logs/herald.log".to_string(),
                            append: true,
                            format,
                            rotation: RotationSettings {
                                max_size,
                                max_files,
                            },
                        },
                    }
                },
            )
    }

    fn arb_fcm_config() -> impl Strategy<Value = FcmConfig> {
        ("[a-z][a-z0-9-]{3,20}", 1u64..=120u64, "[a-z_]{1,12}").prop_map(
            |(project_id, request_timeout_secs, android_channel_id)| FcmConfig {
                project_id,
                request_timeout_secs,
                android_channel_id,
                ..FcmConfig::default()
            },
        )
    }

    fn arb_credentials_config() -> impl Strategy<Value = CredentialsConfig> {
        prop_oneof![
            "[a-z/]{1,30}\\.json".prop_map(|path| CredentialsConfig {
                service_account_path: Some(path),
                ..CredentialsConfig::default()
            }),
            "ya29\\.[A-Za-z0-9]{8,40}".prop_map(|token| CredentialsConfig {
                access_token: Some(token),
                ..CredentialsConfig::default()
            }),
        ]
    }

    fn arb_dispatch_config() -> impl Strategy<Value = DispatchConfig> {
        (0u32..=10u32, 1u64..=1000u64, 0u32..=4u32, any::<bool>()).prop_map(
            |(max_retries, initial_backoff_ms, multiplier_steps, jitter)| DispatchConfig {
                max_retries,
                initial_backoff_ms,
                max_backoff_ms: initial_backoff_ms * 20,
                // Multiples of 0.5 survive a TOML round trip exactly
                backoff_multiplier: 1.0 + multiplier_steps as f64 * 0.5,
                jitter,
            },
        )
    }

    fn arb_settings() -> impl Strategy<Value = Settings> {
        (
            arb_application_config(),
            arb_server_config(),
            arb_logger_settings(),
            arb_fcm_config(),
            arb_credentials_config(),
            arb_dispatch_config(),
            proptest::option::of("[A-Za-z0-9]{16,32}"),
        )
            .prop_map(
                |(application, server, logger, fcm, credentials, dispatch, secret)| Settings {
                    application,
                    server,
                    logger,
                    fcm,
                    credentials,
                    dispatch,
                    acknowledgments: AcknowledgmentsConfig { secret },
                },
            )
    }

    // ========================================================================
    // Property-based tests
    // ========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Serializing settings to TOML and back yields the same settings.
        #[test]
        fn prop_settings_round_trip_serialization(settings in arb_settings()) {
            let toml_str = toml::to_string(&settings)
                .expect("Settings should serialize to TOML");
            let deserialized: Settings = toml::from_str(&toml_str)
                .expect("TOML should deserialize back to Settings");
            prop_assert_eq!(settings, deserialized);
        }
    }

    // ========================================================================
    // Unit tests
    // ========================================================================

    #[test]
    fn test_application_config_defaults() {
        let config = ApplicationConfig::default();
        assert_eq!(config.name, "herald-rs");
        assert_eq!(config.version, crate::pkg_version());
    }

    #[test]
    fn test_server_config_address() {
        let config = ServerConfig::default();
        assert_eq!(config.address(), "127.0.0.1:3000");
    }

    #[test]
    fn test_fcm_config_defaults() {
        let config = FcmConfig::default();
        assert_eq!(config.endpoint, "https://fcm.googleapis.com");
        assert_eq!(config.android_channel_id, "default");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_dispatch_config_defaults() {
        let config = DispatchConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_backoff_ms, 500);
        assert_eq!(config.max_backoff_ms, 10_000);
        assert_eq!(config.backoff_multiplier, 2.0);
        assert!(config.jitter);
    }

    #[test]
    fn test_secrets_are_redacted_in_debug() {
        let settings = Settings {
            credentials: CredentialsConfig {
                access_token: Some("ya29.very-secret".to_string()),
                ..CredentialsConfig::default()
            },
            acknowledgments: AcknowledgmentsConfig {
                secret: Some("hook-secret-value".to_string()),
            },
            ..Settings::default()
        };
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("hook-secret-value"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [fcm]
            project_id = "demo"

            [credentials]
            access_token = "ya29.token"
            "#,
        )
        .unwrap();
        assert_eq!(settings.fcm.project_id, "demo");
        assert_eq!(settings.fcm.default_body, "You have a new notification");
        assert_eq!(settings.credentials.scope, MESSAGING_SCOPE);
        assert_eq!(settings.dispatch, DispatchConfig::default());
    }

    #[test]
    fn test_logger_settings_conversion() {
        let settings = LoggerSettings {
            file: FileSettings {
                enabled: true,
                format: "compact".to_string(),
                ..FileSettings::default()
            },
            ..LoggerSettings::default()
        };
        let config = settings.into_logger_config().unwrap();
        assert!(config.file.enabled);
        assert_eq!(config.file.format, LogFormat::Compact);
        assert_eq!(config.file.rotation.max_files, 5);
    }

    #[test]
    fn test_logger_settings_invalid_format() {
        let settings = LoggerSettings {
            file: FileSettings {
                format: "xml".to_string(),
                ..FileSettings::default()
            },
            ..LoggerSettings::default()
        };
        let err = settings.into_logger_config().unwrap_err();
        assert!(
            matches!(err, ConfigError::ValidationError { field, .. } if field == "logger.file.format")
        );
    }
}
