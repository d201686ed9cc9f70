//! Request well-formedness checks applied before an attempt is created.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{AppError, AppResult};
use crate::models::Payload;

/// Maximum number of payload keys
pub const MAX_PAYLOAD_KEYS: usize = 100;

/// FCM data payload limit in bytes
pub const MAX_PAYLOAD_BYTES: usize = 4096;

/// Keys the provider reserves for itself
const RESERVED_KEYS: &[&str] = &["from", "notification", "message_type"];

/// Fields that end up in the visible notification and must be text
const TEXT_KEYS: &[&str] = &["title", "body"];

static RESERVED_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(google|gcm)\.").expect("static regex is valid"));

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> AppError {
    AppError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

/// Rejects empty or whitespace-only device tokens
pub fn validate_target_token(target_token: &str) -> AppResult<()> {
    if target_token.trim().is_empty() {
        return Err(invalid("target_token", "must not be empty"));
    }
    Ok(())
}

/// Checks key count, reserved keys, text fields, and serialized size
pub fn validate_payload(payload: &Payload) -> AppResult<()> {
    if payload.len() > MAX_PAYLOAD_KEYS {
        return Err(invalid(
            "payload",
            format!(
                "has {} keys, at most {} are allowed",
                payload.len(),
                MAX_PAYLOAD_KEYS
            ),
        ));
    }

    for (key, value) in payload {
        if key.trim().is_empty() {
            return Err(invalid("payload", "keys must not be empty"));
        }
        if RESERVED_KEYS.contains(&key.as_str()) || RESERVED_PREFIX.is_match(key) {
            return Err(invalid(
                format!("payload.{}", key),
                "key is reserved by the messaging provider",
            ));
        }
        if TEXT_KEYS.contains(&key.as_str()) && value.as_str().is_none() {
            return Err(invalid(format!("payload.{}", key), "must be a string"));
        }
    }

    let size = serde_json::to_vec(payload)
        .map_err(|e| AppError::Internal { source: e.into() })?
        .len();
    if size > MAX_PAYLOAD_BYTES {
        return Err(invalid(
            "payload",
            format!(
                "serialized size is {} bytes, limit is {} bytes",
                size, MAX_PAYLOAD_BYTES
            ),
        ));
    }

    Ok(())
}
