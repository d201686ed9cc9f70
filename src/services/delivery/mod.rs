//! Delivery pipeline: validation, dispatch with retries, acknowledgments.

mod dispatcher;
mod payload;
mod retry;
mod status_receiver;

pub use dispatcher::Dispatcher;
pub use payload::{MAX_PAYLOAD_BYTES, MAX_PAYLOAD_KEYS, validate_payload, validate_target_token};
pub use retry::RetryPolicy;
pub use status_receiver::StatusReceiver;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{AckOutcome, AttemptEvent, AttemptState, AttemptStats, DeliveryAttempt, Payload};
use crate::repositories::AttemptRepository;

/// Entry point for handlers and the CLI: sends, lookups, and acknowledgments
#[derive(Clone)]
pub struct DeliveryService {
    dispatcher: Dispatcher,
    status: StatusReceiver,
    attempts: AttemptRepository,
}

impl DeliveryService {
    /// Creates the service; the dispatcher must write to `attempts`
    pub fn new(dispatcher: Dispatcher, attempts: AttemptRepository) -> Self {
        Self {
            dispatcher,
            status: StatusReceiver::new(attempts.clone()),
            attempts,
        }
    }

    pub async fn send(&self, target_token: &str, payload: Payload) -> AppResult<DeliveryAttempt> {
        self.dispatcher.send(target_token, payload).await
    }

    pub async fn send_with_cancellation(
        &self,
        target_token: &str,
        payload: Payload,
        cancel: &CancellationToken,
    ) -> AppResult<DeliveryAttempt> {
        self.dispatcher
            .send_with_cancellation(target_token, payload, cancel)
            .await
    }

    pub fn submit(&self, target_token: &str, payload: Payload) -> AppResult<DeliveryAttempt> {
        self.dispatcher.submit(target_token, payload)
    }

    pub fn cancel(&self, attempt_id: Uuid) -> AppResult<DeliveryAttempt> {
        self.dispatcher.cancel(attempt_id)
    }

    pub fn get(&self, attempt_id: Uuid) -> AppResult<DeliveryAttempt> {
        self.attempts.find_by_id(attempt_id)
    }

    /// Lists attempts newest first, returning the page and the total count
    pub fn list(
        &self,
        state: Option<AttemptState>,
        offset: usize,
        limit: usize,
    ) -> (Vec<DeliveryAttempt>, usize) {
        self.attempts.list(state, offset, limit)
    }

    pub fn stats(&self) -> AttemptStats {
        self.attempts.stats()
    }

    pub fn report_acknowledgment(
        &self,
        provider_message_id: &str,
        outcome: AckOutcome,
    ) -> AppResult<DeliveryAttempt> {
        self.status.report_acknowledgment(provider_message_id, outcome)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AttemptEvent> {
        self.attempts.subscribe()
    }

    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    /// Cancels outstanding dispatches, returning how many were discarded
    pub fn shutdown(&self) -> usize {
        let cancelled = self.dispatcher.cancel_all();
        if cancelled > 0 {
            tracing::info!(cancelled, "Cancelled pending dispatches");
        }
        cancelled
    }
}
