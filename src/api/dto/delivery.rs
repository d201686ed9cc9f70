//! Delivery-related DTOs for API requests and responses.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::pagination::{MAX_PAGE_SIZE, default_page, default_page_size};
use crate::models::{
    AttemptError, AttemptState, AttemptStats, DeliveryAttempt, ErrorKind, Payload,
};

// ============================================================================
// Request DTOs
// ============================================================================

/// Request body for sending one notification.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[schema(example = json!({
    "target_token": "fcm-registration-token",
    "payload": {"title": "Hi", "body": "You have a new message", "conversation_id": 42}
}))]
pub struct SendDeliveryRequest {
    /// Device registration token
    #[validate(length(min = 1, message = "Target token must not be empty"))]
    #[schema(min_length = 1)]
    pub target_token: String,

    /// Title, body, and custom data; values are strings, numbers, or booleans
    #[serde(default)]
    #[schema(value_type = Object)]
    pub payload: Payload,
}

/// How the send request is completed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Wait for the provider outcome
    #[default]
    Sync,
    /// Return the pending attempt and dispatch in the background
    Async,
}

/// Query parameters for the send endpoint.
#[derive(Debug, Default, Deserialize, IntoParams, Validate)]
pub struct SendOptions {
    /// `sync` (default) or `async`
    #[serde(default)]
    pub mode: DispatchMode,
}

/// Query parameters for listing deliveries.
#[derive(Debug, Deserialize, IntoParams, Validate)]
pub struct ListDeliveriesParams {
    /// Only return attempts in this state
    pub state: Option<AttemptState>,

    /// Page number (1-based)
    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    #[param(minimum = 1, example = 1)]
    pub page: u32,

    /// Number of items per page (max 100)
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 100, message = "Page size must be between 1 and 100"))]
    #[param(minimum = 1, maximum = 100, example = 20)]
    pub page_size: u32,
}

impl ListDeliveriesParams {
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.limit()
    }

    pub fn limit(&self) -> usize {
        self.page_size.min(MAX_PAGE_SIZE) as usize
    }
}

// ============================================================================
// Response DTOs
// ============================================================================

/// Error recorded on a failed attempt.
#[derive(Debug, Serialize, ToSchema)]
pub struct AttemptErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl From<AttemptError> for AttemptErrorResponse {
    fn from(error: AttemptError) -> Self {
        Self {
            kind: error.kind,
            message: error.message,
            status_code: error.status_code,
        }
    }
}

/// A delivery attempt as returned by the API.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeliveryResponse {
    pub attempt_id: Uuid,
    pub target_token: String,
    #[schema(value_type = Object)]
    pub payload: Payload,
    pub state: AttemptState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<AttemptErrorResponse>,
    /// Outbound provider calls made, retries included
    pub provider_attempts: u32,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: String,
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: String,
}

impl From<DeliveryAttempt> for DeliveryResponse {
    fn from(attempt: DeliveryAttempt) -> Self {
        Self {
            attempt_id: attempt.attempt_id,
            target_token: attempt.target_token,
            payload: attempt.payload,
            state: attempt.state,
            provider_message_id: attempt.provider_message_id,
            last_error: attempt.last_error.map(AttemptErrorResponse::from),
            provider_attempts: attempt.provider_attempts,
            created_at: attempt.created_at.to_string(),
            updated_at: attempt.updated_at.to_string(),
        }
    }
}

/// Attempt counts per state.
#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({"pending": 1, "sent": 4, "acknowledged": 10, "failed": 2, "total": 17}))]
pub struct StatsResponse {
    pub pending: u64,
    pub sent: u64,
    pub acknowledged: u64,
    pub failed: u64,
    pub total: u64,
}

impl From<AttemptStats> for StatsResponse {
    fn from(stats: AttemptStats) -> Self {
        Self {
            pending: stats.pending,
            sent: stats.sent,
            acknowledged: stats.acknowledged,
            failed: stats.failed,
            total: stats.total(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PayloadValue;

    #[test]
    fn test_send_request_deserializes_primitive_payload() {
        let request: SendDeliveryRequest = serde_json::from_str(
            r#"{"target_token":"tok-1","payload":{"title":"Hi","badge":3,"silent":true}}"#,
        )
        .unwrap();
        assert_eq!(request.payload["title"], PayloadValue::from("Hi"));
        assert_eq!(request.payload["silent"], PayloadValue::from(true));
        assert!(request.validate().is_ok());

        // Nested objects are not primitive values
        let nested = serde_json::from_str::<SendDeliveryRequest>(
            r#"{"target_token":"tok-1","payload":{"extra":{"a":1}}}"#,
        );
        assert!(nested.is_err());
    }

    #[test]
    fn test_list_params_offset() {
        let params = ListDeliveriesParams {
            state: None,
            page: 3,
            page_size: 10,
        };
        assert_eq!(params.offset(), 20);
        assert_eq!(params.limit(), 10);
    }

    #[test]
    fn test_delivery_response_omits_unset_fields() {
        let attempt = DeliveryAttempt::new("tok-1".to_string(), Payload::new());
        let json = serde_json::to_value(DeliveryResponse::from(attempt)).unwrap();
        assert_eq!(json["state"], "pending");
        assert!(json.get("provider_message_id").is_none());
        assert!(json.get("last_error").is_none());
    }
}
