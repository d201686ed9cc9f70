//! Applies external delivery acknowledgments to stored attempts.

use crate::error::{AppError, AppResult};
use crate::models::{AckOutcome, AttemptState, DeliveryAttempt};
use crate::repositories::AttemptRepository;

/// Resolves acknowledgments by provider message id
#[derive(Clone)]
pub struct StatusReceiver {
    attempts: AttemptRepository,
}

impl StatusReceiver {
    pub fn new(attempts: AttemptRepository) -> Self {
        Self { attempts }
    }

    /// Records a delivery outcome reported for a provider message
    ///
    /// Reports for attempts that are already terminal are accepted without
    /// changing anything, so repeated webhook deliveries are harmless.
    ///
    /// # Arguments
    /// * `provider_message_id` - Identifier returned by the provider on send
    /// * `outcome` - Reported outcome
    ///
    /// # Returns
    /// The attempt as stored after the report; `NotFound` for unknown ids
    pub fn report_acknowledgment(
        &self,
        provider_message_id: &str,
        outcome: AckOutcome,
    ) -> AppResult<DeliveryAttempt> {
        let attempt = match self.attempts.find_by_provider_message_id(provider_message_id) {
            Ok(attempt) => attempt,
            Err(e) => {
                tracing::warn!(
                    provider_message_id = %provider_message_id,
                    outcome = outcome.as_str(),
                    "Acknowledgment for unknown provider message"
                );
                return Err(e);
            }
        };

        if attempt.state.is_terminal() {
            tracing::debug!(
                attempt_id = %attempt.attempt_id,
                state = %attempt.state,
                outcome = outcome.as_str(),
                "Duplicate acknowledgment ignored"
            );
            return Ok(attempt);
        }

        let attempt_id = attempt.attempt_id;
        match self
            .attempts
            .transition(attempt_id, AttemptState::Sent, outcome.into_transition())
        {
            Ok(updated) => Ok(updated),
            // Lost a race with another writer; terminal means someone else settled it
            Err(AppError::InvalidTransition { .. }) => {
                let current = self.attempts.find_by_id(attempt_id)?;
                if current.state.is_terminal() {
                    tracing::debug!(
                        attempt_id = %attempt_id,
                        state = %current.state,
                        "Acknowledgment lost race to a concurrent update"
                    );
                    Ok(current)
                } else {
                    Err(AppError::InvalidTransition {
                        attempt_id,
                        from: current.state,
                        to: AttemptState::Acknowledged,
                    })
                }
            }
            Err(e) => Err(e),
        }
    }
}
