//! Configuration error types

use thiserror::Error;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// A single key holds an unacceptable value
    #[error("Validation error: {field} - {message}")]
    ValidationError { field: String, message: String },

    #[error("Environment variable error: {0}")]
    EnvVarError(String),

    /// `HERALD_CONFIG_DIR` and `HERALD_CONFIG_FILE` were both set
    #[error("Mutual exclusivity error: {0}")]
    MutualExclusivityError(String),

    /// Credentials must name exactly one source: a service account key or a
    /// static access token
    #[error("Credential source error: {0}")]
    CredentialSource(String),

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

impl ConfigError {
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        ConfigError::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn file_not_found<S: Into<String>>(path: S) -> Self {
        ConfigError::FileNotFound(path.into())
    }

    pub fn mutual_exclusivity<S: Into<String>>(message: S) -> Self {
        ConfigError::MutualExclusivityError(message.into())
    }

    pub fn credential_source<S: Into<String>>(message: S) -> Self {
        ConfigError::CredentialSource(message.into())
    }

    /// Settings key the error points at, when it concerns a single section
    pub fn key(&self) -> Option<&str> {
        match self {
            ConfigError::ValidationError { field, .. } => Some(field),
            ConfigError::CredentialSource(_) => Some("credentials"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_of_section_errors() {
        let err = ConfigError::validation("server.port", "Port cannot be 0");
        assert_eq!(err.key(), Some("server.port"));

        let err = ConfigError::credential_source("no credentials configured");
        assert_eq!(err.key(), Some("credentials"));
        assert_eq!(
            err.to_string(),
            "Credential source error: no credentials configured"
        );

        assert_eq!(ConfigError::file_not_found("/etc/herald.toml").key(), None);
    }
}
