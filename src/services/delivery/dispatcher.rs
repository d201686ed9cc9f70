//! Dispatcher: turns a notification request into a provider call.
//!
//! Every request creates one `Pending` attempt. The dispatcher obtains an
//! access token, calls the messaging provider, retries transport failures
//! with backoff, and records `Sent` or `Failed` on the same attempt.
//!
//! Cancellation is honoured until a provider call begins. Before that point a
//! cancelled dispatch discards its `Pending` attempt instead of failing it.
//! A caller that stops waiting on [`Dispatcher::send`] counts as a
//! cancellation.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::payload::{validate_payload, validate_target_token};
use super::retry::RetryPolicy;
use crate::error::{AppError, AppResult};
use crate::external::{CredentialProvider, MessagingProvider, ProviderError};
use crate::models::{AttemptError, AttemptState, DeliveryAttempt, ErrorKind, Payload, Transition};
use crate::repositories::AttemptRepository;

/// Bookkeeping for one running dispatch
struct InFlight {
    token: CancellationToken,
    /// Set while the dispatch is committed to a provider call or a final write
    busy: bool,
}

/// Sends notifications through a messaging provider and records the outcome
#[derive(Clone)]
pub struct Dispatcher {
    credentials: Arc<dyn CredentialProvider>,
    provider: Arc<dyn MessagingProvider>,
    attempts: AttemptRepository,
    retry: RetryPolicy,
    scope: String,
    in_flight: Arc<DashMap<Uuid, InFlight>>,
}

/// Cancels a synchronous dispatch whose caller stopped waiting
struct CallerGuard<'a> {
    dispatcher: &'a Dispatcher,
    attempt_id: Uuid,
    armed: bool,
}

impl Drop for CallerGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.dispatcher.cancel(self.attempt_id) {
            Ok(_) => {
                tracing::info!(attempt_id = %self.attempt_id, "Caller went away, pending attempt discarded")
            }
            Err(e) => {
                tracing::debug!(attempt_id = %self.attempt_id, error = %e, "Caller went away, dispatch left to finish")
            }
        }
    }
}

impl Dispatcher {
    /// Creates a dispatcher that requests tokens for the provider's own scope
    ///
    /// # Arguments
    /// * `credentials` - Source of access tokens
    /// * `provider` - Outbound messaging API
    /// * `attempts` - Attempt store shared with the status receiver
    /// * `retry` - Backoff policy for transport failures
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        provider: Arc<dyn MessagingProvider>,
        attempts: AttemptRepository,
        retry: RetryPolicy,
    ) -> Self {
        let scope = provider.scope().to_string();
        Self {
            credentials,
            provider,
            attempts,
            retry,
            scope,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Overrides the OAuth scope requested from the credential provider
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Sends one notification and waits for the outcome
    ///
    /// # Returns
    /// The `Sent` attempt. Failures after creation return `Auth` or `Provider`
    /// errors carrying the attempt id of the `Failed` record.
    pub async fn send(&self, target_token: &str, payload: Payload) -> AppResult<DeliveryAttempt> {
        self.send_with_cancellation(target_token, payload, &CancellationToken::new())
            .await
    }

    /// Like [`send`](Self::send), but gives up before the provider call once
    /// `cancel` fires, discarding the attempt
    ///
    /// The dispatch runs on its own task. Dropping the returned future before
    /// a provider call starts discards the attempt; once a call is under way
    /// the task still records `Sent` or `Failed`.
    pub async fn send_with_cancellation(
        &self,
        target_token: &str,
        payload: Payload,
        cancel: &CancellationToken,
    ) -> AppResult<DeliveryAttempt> {
        validate_target_token(target_token)?;
        validate_payload(&payload)?;

        let attempt = self.attempts.create(target_token.to_string(), payload);
        let handle = self.spawn_dispatch(&attempt, cancel.child_token());
        let mut caller = CallerGuard {
            dispatcher: self,
            attempt_id: attempt.attempt_id,
            armed: true,
        };

        let joined = handle.await;
        caller.armed = false;
        joined.map_err(|e| AppError::Internal { source: e.into() })?
    }

    /// Creates the attempt and completes the dispatch on a background task
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Returns
    /// The `Pending` attempt; its outcome is observable through the store
    pub fn submit(&self, target_token: &str, payload: Payload) -> AppResult<DeliveryAttempt> {
        validate_target_token(target_token)?;
        validate_payload(&payload)?;

        let attempt = self.attempts.create(target_token.to_string(), payload);
        // Detached: the outcome lands in the store
        drop(self.spawn_dispatch(&attempt, CancellationToken::new()));

        tracing::debug!(attempt_id = %attempt.attempt_id, "Dispatch submitted");
        Ok(attempt)
    }

    /// Registers the attempt as in flight and runs its dispatch on a new task
    fn spawn_dispatch(
        &self,
        attempt: &DeliveryAttempt,
        token: CancellationToken,
    ) -> JoinHandle<AppResult<DeliveryAttempt>> {
        let attempt_id = attempt.attempt_id;
        self.in_flight.insert(
            attempt_id,
            InFlight {
                token: token.clone(),
                busy: false,
            },
        );

        let dispatcher = self.clone();
        let target_token = attempt.target_token.clone();
        let payload = attempt.payload.clone();
        tokio::spawn(async move {
            let result = dispatcher
                .dispatch(attempt_id, &target_token, &payload, &token)
                .await;
            dispatcher.in_flight.remove(&attempt_id);
            if let Err(e) = &result {
                tracing::debug!(attempt_id = %attempt_id, error = %e, "Dispatch ended without delivery");
            }
            result
        })
    }

    /// Cancels a dispatch that has not reached the provider
    ///
    /// # Returns
    /// The discarded attempt. `DispatchInProgress` while a provider call is
    /// under way, `InvalidTransition` once the attempt left `Pending`.
    pub fn cancel(&self, attempt_id: Uuid) -> AppResult<DeliveryAttempt> {
        let Some(entry) = self.in_flight.get(&attempt_id) else {
            let attempt = self.attempts.find_by_id(attempt_id)?;
            return Err(AppError::InvalidTransition {
                attempt_id,
                from: attempt.state,
                to: AttemptState::Pending,
            });
        };

        if entry.busy {
            return Err(AppError::DispatchInProgress { attempt_id });
        }

        // The entry stays locked until the attempt is gone, so the task cannot
        // commit to a provider call in between
        let discarded = self.attempts.discard(attempt_id)?;
        entry.token.cancel();
        drop(entry);

        tracing::info!(attempt_id = %attempt_id, "Dispatch cancelled");
        Ok(discarded)
    }

    /// Number of dispatches that have not finished
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Cancels every dispatch that can still be cancelled
    pub fn cancel_all(&self) -> usize {
        let ids: Vec<Uuid> = self.in_flight.iter().map(|entry| *entry.key()).collect();
        ids.into_iter()
            .filter(|id| self.cancel(*id).is_ok())
            .count()
    }

    async fn dispatch(
        &self,
        attempt_id: Uuid,
        target_token: &str,
        payload: &Payload,
        cancel: &CancellationToken,
    ) -> AppResult<DeliveryAttempt> {
        let access_token = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.abandon(attempt_id),
            result = self.credentials.access_token(&self.scope) => result,
        };

        let access_token = match access_token {
            Ok(token) => token,
            Err(e) => {
                if !self.claim(attempt_id, cancel) {
                    return self.abandon(attempt_id);
                }
                let message = e.to_string();
                tracing::warn!(
                    attempt_id = %attempt_id,
                    credentials = self.credentials.name(),
                    error = %message,
                    "Credential acquisition failed"
                );
                self.attempts.transition(
                    attempt_id,
                    AttemptState::Pending,
                    Transition::Failed {
                        error: AttemptError::new(ErrorKind::Auth, message.clone()),
                    },
                )?;
                return Err(AppError::Auth {
                    attempt_id: Some(attempt_id),
                    message,
                });
            }
        };

        let mut retries = 0;
        loop {
            if !self.claim(attempt_id, cancel) {
                return self.abandon(attempt_id);
            }
            let call = self.attempts.record_provider_attempt(attempt_id)?;
            tracing::debug!(
                attempt_id = %attempt_id,
                provider = self.provider.name(),
                call,
                "Calling messaging provider"
            );

            match self
                .provider
                .send_message(&access_token, target_token, payload)
                .await
            {
                Ok(provider_message_id) => {
                    return self.attempts.transition(
                        attempt_id,
                        AttemptState::Pending,
                        Transition::Sent {
                            provider_message_id,
                        },
                    );
                }
                Err(err) if err.is_transient() && self.retry.should_retry(retries) => {
                    let delay = self.retry.delay(retries);
                    retries += 1;
                    tracing::warn!(
                        attempt_id = %attempt_id,
                        provider = self.provider.name(),
                        retry = retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient provider failure, retrying"
                    );
                    self.release(attempt_id);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return self.abandon(attempt_id),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(err) => return self.fail(attempt_id, err),
            }
        }
    }

    /// Records a final provider error on the attempt
    fn fail(&self, attempt_id: Uuid, err: ProviderError) -> AppResult<DeliveryAttempt> {
        let kind = if err.is_transient() {
            ErrorKind::Network
        } else {
            ErrorKind::Provider
        };
        let message = err.to_string();
        let mut error = AttemptError::new(kind, message.clone());
        if let Some(status) = err.status_code() {
            error = error.with_status(status);
        }

        tracing::warn!(
            attempt_id = %attempt_id,
            provider = self.provider.name(),
            kind = ?kind,
            error = %message,
            "Delivery attempt failed"
        );
        self.attempts
            .transition(attempt_id, AttemptState::Pending, Transition::Failed { error })?;

        Err(AppError::Provider {
            attempt_id: Some(attempt_id),
            status_code: err.status_code(),
            message,
        })
    }

    /// Commits the dispatch to its next step unless cancellation won
    fn claim(&self, attempt_id: Uuid, cancel: &CancellationToken) -> bool {
        match self.in_flight.get_mut(&attempt_id) {
            Some(mut entry) => {
                if entry.token.is_cancelled() {
                    return false;
                }
                entry.busy = true;
                true
            }
            None => !cancel.is_cancelled(),
        }
    }

    fn release(&self, attempt_id: Uuid) {
        if let Some(mut entry) = self.in_flight.get_mut(&attempt_id) {
            entry.busy = false;
        }
    }

    /// Discards the `Pending` attempt after cancellation
    fn abandon(&self, attempt_id: Uuid) -> AppResult<DeliveryAttempt> {
        match self.attempts.discard(attempt_id) {
            // `cancel` may have discarded it already
            Ok(_) | Err(AppError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }
        tracing::info!(attempt_id = %attempt_id, "Dispatch abandoned before provider call");
        Err(AppError::Cancelled { attempt_id })
    }
}
