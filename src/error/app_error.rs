use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::AttemptState;

/// Application-wide error type that represents all possible errors in the system.
///
/// Delivery failures that happen after an attempt was created (`Auth`, `Provider`)
/// carry the attempt id so callers can read back the `Failed` record.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found error with entity, field, and value information
    #[error("Resource not found: {entity} with {field}={value}")]
    NotFound {
        entity: String,
        field: String,
        value: String,
    },

    /// Validation error with field-specific details
    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Multiple field validation errors collected from a request body
    #[error("Validation failed for {} field(s)", errors.len())]
    ValidationErrors { errors: Vec<ValidationFieldError> },

    /// Bad request error with descriptive message
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    /// Unauthorized access error with authentication message
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// A state change was rejected because the attempt is no longer in the expected state
    #[error("Invalid transition for attempt {attempt_id}: {from} -> {to}")]
    InvalidTransition {
        attempt_id: Uuid,
        from: AttemptState,
        to: AttemptState,
    },

    /// Access token could not be obtained for the messaging provider
    #[error("Credential acquisition failed: {message}")]
    Auth {
        attempt_id: Option<Uuid>,
        message: String,
    },

    /// Messaging provider rejected the request or could not be reached
    #[error("Provider error: {message}")]
    Provider {
        attempt_id: Option<Uuid>,
        status_code: Option<u16>,
        message: String,
    },

    /// The dispatch is waiting on the provider and can no longer be cancelled
    #[error("Attempt {attempt_id} is in a provider call and cannot be cancelled")]
    DispatchInProgress { attempt_id: Uuid },

    /// Dispatch was cancelled before the provider accepted it
    #[error("Dispatch cancelled for attempt {attempt_id}")]
    Cancelled { attempt_id: Uuid },

    /// Configuration error with key information
    #[error("Configuration error: {key}")]
    Configuration {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Internal error for unexpected failures
    #[error("Internal error")]
    Internal {
        #[source]
        source: anyhow::Error,
    },
}

/// One failed field from request validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFieldError {
    pub field: String,
    pub message: String,
}

impl AppError {
    /// Attempt id attached to the error, if the failure happened after creation
    pub fn attempt_id(&self) -> Option<Uuid> {
        match self {
            AppError::InvalidTransition { attempt_id, .. }
            | AppError::DispatchInProgress { attempt_id }
            | AppError::Cancelled { attempt_id } => Some(*attempt_id),
            AppError::Auth { attempt_id, .. } | AppError::Provider { attempt_id, .. } => {
                *attempt_id
            }
            _ => None,
        }
    }

    pub(crate) fn attempt_not_found(attempt_id: Uuid) -> Self {
        AppError::NotFound {
            entity: "delivery_attempt".to_string(),
            field: "attempt_id".to_string(),
            value: attempt_id.to_string(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal { source: error }
    }
}

impl From<crate::config::error::ConfigError> for AppError {
    fn from(error: crate::config::error::ConfigError) -> Self {
        let key = error.key().unwrap_or("settings").to_string();
        AppError::Configuration {
            key,
            source: anyhow::Error::new(error),
        }
    }
}

impl From<crate::external::CredentialError> for AppError {
    fn from(error: crate::external::CredentialError) -> Self {
        AppError::Auth {
            attempt_id: None,
            message: error.to_string(),
        }
    }
}

impl From<crate::external::ProviderError> for AppError {
    fn from(error: crate::external::ProviderError) -> Self {
        AppError::Provider {
            attempt_id: None,
            status_code: error.status_code(),
            message: error.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut collected: Vec<ValidationFieldError> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |err| ValidationFieldError {
                    field: field.to_string(),
                    message: err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| err.code.to_string()),
                })
            })
            .collect();
        collected.sort_by(|a, b| a.field.cmp(&b.field));
        AppError::ValidationErrors { errors: collected }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest {
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest {
            message: rejection.body_text(),
        }
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest {
            message: rejection.body_text(),
        }
    }
}

/// Type alias for Result with AppError to simplify function signatures
pub type AppResult<T> = Result<T, AppError>;
