//! Acknowledgment webhook DTOs.

use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::AckOutcome;

/// Delivery report pushed by the provider or a device-side relay.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[schema(example = json!({
    "provider_message_id": "projects/demo/messages/0:1700000000000000%abc",
    "outcome": "delivered"
}))]
pub struct AcknowledgmentRequest {
    /// Message id returned by the provider when the attempt was sent
    #[validate(length(min = 1, message = "Provider message id must not be empty"))]
    pub provider_message_id: String,

    /// `delivered` (or `received`, `acknowledged`) and `failed` (or `undeliverable`)
    #[schema(example = "delivered")]
    pub outcome: String,

    /// Optional detail for failed outcomes
    pub reason: Option<String>,
}

impl AcknowledgmentRequest {
    /// Parses the outcome string, attaching the reason to failures
    pub fn outcome(&self) -> AppResult<AckOutcome> {
        let outcome: AckOutcome =
            self.outcome
                .parse()
                .map_err(|reason| AppError::Validation {
                    field: "outcome".to_string(),
                    reason,
                })?;
        Ok(outcome.with_reason(self.reason.clone()))
    }
}
