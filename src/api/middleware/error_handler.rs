//! Error handler for converting AppError to HTTP responses.
//!
//! Implements `IntoResponse` for `AppError` so handlers can return
//! `AppResult<T>` directly. Bodies follow `ErrorResponse` and carry the
//! request id of the current request when one is in scope.

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::request_id::current_request_id;
use crate::api::dto::ErrorResponse;
use crate::error::AppError;

impl IntoResponse for AppError {
    /// # Status Code Mapping
    /// - Validation, ValidationErrors, BadRequest → 400
    /// - Unauthorized → 401
    /// - NotFound → 404
    /// - InvalidTransition, DispatchInProgress, Cancelled → 409
    /// - Auth, Provider → 502
    /// - Configuration, Internal → 500
    fn into_response(self) -> Response {
        let status = error_to_status_code(&self);
        let code = error_to_code(&self);

        let error_response = match &self {
            AppError::NotFound {
                entity,
                field,
                value,
            } => ErrorResponse::not_found_error(entity, field, value),
            AppError::Validation { field, reason } => {
                ErrorResponse::validation_error(field, reason)
            }
            AppError::ValidationErrors { errors } => {
                ErrorResponse::new(code, &self.to_string()).with_details(json!({ "errors": errors }))
            }
            AppError::BadRequest { message } | AppError::Unauthorized { message } => {
                ErrorResponse::new(code, message)
            }
            AppError::InvalidTransition {
                attempt_id,
                from,
                to,
            } => ErrorResponse::new(code, &self.to_string()).with_details(json!({
                "attempt_id": attempt_id,
                "from": from,
                "to": to,
            })),
            AppError::DispatchInProgress { attempt_id } | AppError::Cancelled { attempt_id } => {
                ErrorResponse::new(code, &self.to_string())
                    .with_details(json!({ "attempt_id": attempt_id }))
            }
            AppError::Auth {
                attempt_id,
                message,
            } => ErrorResponse::new(code, message).with_details(json!({
                "attempt_id": attempt_id,
            })),
            AppError::Provider {
                attempt_id,
                status_code,
                message,
            } => ErrorResponse::new(code, message).with_details(json!({
                "attempt_id": attempt_id,
                "status_code": status_code,
            })),
            AppError::Configuration { key, source } => {
                tracing::error!(key = %key, error = %source, "Configuration error while handling request");
                ErrorResponse::new(code, &format!("Configuration error: {}", key))
                    .with_details(json!({ "key": key }))
            }
            AppError::Internal { source } => {
                tracing::error!(error = ?source, "Internal error while handling request");
                ErrorResponse::new(code, "An internal error occurred")
            }
        };

        let error_response = match current_request_id() {
            Some(request_id) => error_response.with_request_id(&request_id),
            None => error_response,
        };

        (status, Json(error_response)).into_response()
    }
}

/// Maps an AppError variant to its corresponding HTTP status code.
pub fn error_to_status_code(error: &AppError) -> StatusCode {
    match error {
        AppError::Validation { .. }
        | AppError::ValidationErrors { .. }
        | AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
        AppError::NotFound { .. } => StatusCode::NOT_FOUND,
        AppError::InvalidTransition { .. }
        | AppError::DispatchInProgress { .. }
        | AppError::Cancelled { .. } => StatusCode::CONFLICT,
        AppError::Auth { .. } | AppError::Provider { .. } => StatusCode::BAD_GATEWAY,
        AppError::Configuration { .. } | AppError::Internal { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Maps an AppError variant to its error code string.
pub fn error_to_code(error: &AppError) -> &'static str {
    match error {
        AppError::NotFound { .. } => "NOT_FOUND",
        AppError::Validation { .. } | AppError::ValidationErrors { .. } => "VALIDATION_ERROR",
        AppError::BadRequest { .. } => "BAD_REQUEST",
        AppError::Unauthorized { .. } => "UNAUTHORIZED",
        AppError::InvalidTransition { .. } => "INVALID_TRANSITION",
        AppError::DispatchInProgress { .. } => "DISPATCH_IN_PROGRESS",
        AppError::Cancelled { .. } => "CANCELLED",
        AppError::Auth { .. } => "AUTH_ERROR",
        AppError::Provider { .. } => "PROVIDER_ERROR",
        AppError::Configuration { .. } => "CONFIGURATION_ERROR",
        AppError::Internal { .. } => "INTERNAL_ERROR",
    }
}

/// Rewrites non-JSON error responses (unknown routes, extractor rejections
/// that bypass `AppError`) into the standard `ErrorResponse` body.
pub async fn global_error_handler(
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let response = next.run(request).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"));
    if is_json {
        return response;
    }

    let (_parts, body) = response.into_parts();
    let body_bytes = axum::body::to_bytes(body, 64 * 1024)
        .await
        .unwrap_or_default();
    let original_message = String::from_utf8_lossy(&body_bytes).trim().to_string();

    let code = match status {
        StatusCode::BAD_REQUEST => "BAD_REQUEST",
        StatusCode::NOT_FOUND => "NOT_FOUND",
        StatusCode::METHOD_NOT_ALLOWED => "METHOD_NOT_ALLOWED",
        StatusCode::UNSUPPORTED_MEDIA_TYPE => "UNSUPPORTED_MEDIA_TYPE",
        StatusCode::PAYLOAD_TOO_LARGE => "PAYLOAD_TOO_LARGE",
        _ if status.is_server_error() => "INTERNAL_ERROR",
        _ => "UNKNOWN_ERROR",
    };
    let message = if original_message.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("An unknown error occurred")
            .to_string()
    } else {
        original_message
    };

    let error_response = ErrorResponse::new(code, &message);
    let error_response = match current_request_id() {
        Some(request_id) => error_response.with_request_id(&request_id),
        None => error_response,
    };
    (status, Json(error_response)).into_response()
}
