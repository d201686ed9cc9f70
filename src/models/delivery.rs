//! Delivery attempt models.
//!
//! A `DeliveryAttempt` is the audit record of one push send, from request to
//! provider acceptance and, when the device reports back, confirmed delivery.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Enums
// ============================================================================

/// Lifecycle state of a delivery attempt
///
/// `Sent` means the provider accepted the message. Only `Acknowledged` means
/// the device confirmed receipt.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum AttemptState {
    Pending,
    Sent,
    Acknowledged,
    Failed,
}

impl AttemptState {
    pub const ALL: [AttemptState; 4] = [
        AttemptState::Pending,
        AttemptState::Sent,
        AttemptState::Acknowledged,
        AttemptState::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptState::Pending => "pending",
            AttemptState::Sent => "sent",
            AttemptState::Acknowledged => "acknowledged",
            AttemptState::Failed => "failed",
        }
    }

    /// No transition leaves a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, AttemptState::Acknowledged | AttemptState::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: AttemptState) -> bool {
        matches!(
            (self, next),
            (AttemptState::Pending, AttemptState::Sent)
                | (AttemptState::Pending, AttemptState::Failed)
                | (AttemptState::Sent, AttemptState::Acknowledged)
                | (AttemptState::Sent, AttemptState::Failed)
        )
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(AttemptState::Pending),
            "sent" => Ok(AttemptState::Sent),
            "acknowledged" => Ok(AttemptState::Acknowledged),
            "failed" => Ok(AttemptState::Failed),
            _ => Err(format!(
                "Unrecognized attempt state '{}'. Valid states are: pending, sent, acknowledged, failed",
                s
            )),
        }
    }
}

/// Category of the error recorded on a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Access token could not be obtained
    Auth,
    /// Provider answered with an error status
    Provider,
    /// Provider could not be reached after all retries
    Network,
    /// Device or provider reported the message as undeliverable after acceptance
    Delivery,
}

// ============================================================================
// Payload
// ============================================================================

/// A primitive payload value
///
/// The provider only carries string data, so numbers and booleans are
/// stringified on the wire but kept typed in the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadValue {
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

impl PayloadValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PayloadValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// String form sent in the provider's `data` map
    pub fn to_data_string(&self) -> String {
        match self {
            PayloadValue::String(s) => s.clone(),
            PayloadValue::Number(n) => n.to_string(),
            PayloadValue::Bool(b) => b.to_string(),
        }
    }
}

impl From<&str> for PayloadValue {
    fn from(value: &str) -> Self {
        PayloadValue::String(value.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(value: String) -> Self {
        PayloadValue::String(value)
    }
}

impl From<bool> for PayloadValue {
    fn from(value: bool) -> Self {
        PayloadValue::Bool(value)
    }
}

impl From<i64> for PayloadValue {
    fn from(value: i64) -> Self {
        PayloadValue::Number(value.into())
    }
}

/// Notification payload: title, body and custom data keyed by name
pub type Payload = BTreeMap<String, PayloadValue>;

// ============================================================================
// Delivery Attempt
// ============================================================================

/// Error detail recorded on a `Failed` attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl AttemptError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }
}

/// One record per notification send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub attempt_id: Uuid,
    pub target_token: String,
    pub payload: Payload,
    pub state: AttemptState,
    pub provider_message_id: Option<String>,
    pub last_error: Option<AttemptError>,
    /// Outbound provider calls made for this attempt, retries included
    pub provider_attempts: u32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl DeliveryAttempt {
    pub(crate) fn new(target_token: String, payload: Payload) -> Self {
        let now = Timestamp::now();
        Self {
            attempt_id: Uuid::new_v4(),
            target_token,
            payload,
            state: AttemptState::Pending,
            provider_message_id: None,
            last_error: None,
            provider_attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Checks the field/state coupling: a provider id exactly in `Sent` and
    /// `Acknowledged`, an error exactly in `Failed`.
    pub fn is_consistent(&self) -> bool {
        let has_provider_id = matches!(
            self.state,
            AttemptState::Sent | AttemptState::Acknowledged
        );
        self.provider_message_id.is_some() == has_provider_id
            && self.last_error.is_some() == (self.state == AttemptState::Failed)
    }

    /// Applies a transition that has already been checked against the state machine
    pub(crate) fn apply(&mut self, transition: Transition) {
        self.state = transition.target_state();
        match transition {
            Transition::Sent {
                provider_message_id,
            } => {
                self.provider_message_id = Some(provider_message_id);
            }
            Transition::Acknowledged => {}
            Transition::Failed { error } => {
                self.provider_message_id = None;
                self.last_error = Some(error);
            }
        }
        self.updated_at = Timestamp::now();
    }
}

/// A requested state change together with the fields it sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Sent { provider_message_id: String },
    Acknowledged,
    Failed { error: AttemptError },
}

impl Transition {
    pub fn target_state(&self) -> AttemptState {
        match self {
            Transition::Sent { .. } => AttemptState::Sent,
            Transition::Acknowledged => AttemptState::Acknowledged,
            Transition::Failed { .. } => AttemptState::Failed,
        }
    }
}

// ============================================================================
// Acknowledgments and events
// ============================================================================

/// Outcome carried by an external acknowledgment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    Delivered,
    Failed { reason: Option<String> },
}

impl AckOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckOutcome::Delivered => "delivered",
            AckOutcome::Failed { .. } => "failed",
        }
    }

    pub fn with_reason(self, reason: Option<String>) -> Self {
        match self {
            AckOutcome::Failed { .. } => AckOutcome::Failed { reason },
            delivered => delivered,
        }
    }

    pub(crate) fn into_transition(self) -> Transition {
        match self {
            AckOutcome::Delivered => Transition::Acknowledged,
            AckOutcome::Failed { reason } => Transition::Failed {
                error: AttemptError::new(
                    ErrorKind::Delivery,
                    reason.unwrap_or_else(|| "Delivery reported as failed".to_string()),
                ),
            },
        }
    }
}

impl FromStr for AckOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "delivered" | "received" | "acknowledged" => Ok(AckOutcome::Delivered),
            "failed" | "undeliverable" => Ok(AckOutcome::Failed { reason: None }),
            _ => Err(format!(
                "Unrecognized acknowledgment outcome '{}'. Valid outcomes are: delivered, failed",
                s
            )),
        }
    }
}

/// Emitted after every successful state change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptEvent {
    pub attempt_id: Uuid,
    pub from: AttemptState,
    pub to: AttemptState,
    pub at: Timestamp,
}

/// Number of attempts per state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttemptStats {
    pub pending: u64,
    pub sent: u64,
    pub acknowledged: u64,
    pub failed: u64,
}

impl AttemptStats {
    pub fn total(&self) -> u64 {
        self.pending + self.sent + self.acknowledged + self.failed
    }

    pub(crate) fn record(&mut self, state: AttemptState) {
        match state {
            AttemptState::Pending => self.pending += 1,
            AttemptState::Sent => self.sent += 1,
            AttemptState::Acknowledged => self.acknowledged += 1,
            AttemptState::Failed => self.failed += 1,
        }
    }
}
