//! Shared-secret authentication for the acknowledgment webhook.
//!
//! When `acknowledgments.secret` is configured, callers must present it as
//! `Authorization: Bearer <secret>`. Without a secret the webhook is open.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::state::AppState;

/// Rejects webhook calls that do not carry the configured bearer secret
///
/// # Errors
/// Returns 401 Unauthorized if:
/// - Authorization header is missing
/// - Header is not of the form `Bearer <secret>`
/// - Secret does not match
pub async fn webhook_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.settings.acknowledgments.secret.as_deref() else {
        return Ok(next.run(request).await);
    };

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized {
            message: "Missing authorization header".to_string(),
        })?;

    let presented = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized {
            message: "Invalid authorization header format. Expected: Bearer <secret>".to_string(),
        })?;

    if !constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
        tracing::warn!("Acknowledgment rejected: invalid webhook secret");
        return Err(AppError::Unauthorized {
            message: "Invalid webhook secret".to_string(),
        });
    }

    Ok(next.run(request).await)
}

/// Compares equal-length inputs without short-circuiting on the first
/// differing byte
///
/// Inputs of different length return early, so response timing reveals the
/// secret's length but not its content.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_constant_time_eq_length_mismatch() {
        // A prefix or an extension of the secret never matches
        assert!(!constant_time_eq(b"webhook-secret", b"webhook"));
        assert!(!constant_time_eq(b"webhook", b"webhook-secret"));
        assert!(!constant_time_eq(b"", b"x"));
    }
}
