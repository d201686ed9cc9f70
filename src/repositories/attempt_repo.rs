//! Delivery attempt repository.
//!
//! In-memory store of delivery attempts keyed by attempt id, with a secondary
//! index from provider message id to attempt id. State changes are applied as
//! a check-and-set under the entry's shard lock, so concurrent writers on the
//! same attempt have at most one winner.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    AttemptEvent, AttemptState, AttemptStats, DeliveryAttempt, Payload, Transition,
};

/// Buffered events per subscriber before slow receivers start lagging
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Delivery attempt repository
///
/// Cloning is cheap; all clones share the same underlying maps.
#[derive(Clone)]
pub struct AttemptRepository {
    attempts: Arc<DashMap<Uuid, DeliveryAttempt>>,
    by_provider_id: Arc<DashMap<String, Uuid>>,
    events: broadcast::Sender<AttemptEvent>,
}

impl Default for AttemptRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl AttemptRepository {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            attempts: Arc::new(DashMap::new()),
            by_provider_id: Arc::new(DashMap::new()),
            events,
        }
    }

    /// Creates a new `Pending` attempt
    ///
    /// # Arguments
    /// * `target_token` - Device registration token
    /// * `payload` - Already validated payload
    ///
    /// # Returns
    /// A snapshot of the stored attempt
    pub fn create(&self, target_token: String, payload: Payload) -> DeliveryAttempt {
        let attempt = DeliveryAttempt::new(target_token, payload);
        self.attempts.insert(attempt.attempt_id, attempt.clone());
        tracing::debug!(attempt_id = %attempt.attempt_id, "Delivery attempt created");
        attempt
    }

    /// Finds an attempt by id
    pub fn find_by_id(&self, attempt_id: Uuid) -> AppResult<DeliveryAttempt> {
        self.attempts
            .get(&attempt_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::attempt_not_found(attempt_id))
    }

    /// Finds an attempt by the identifier the provider assigned on acceptance
    ///
    /// The index entry is kept after a `Sent -> Failed` transition clears the
    /// field, so attempts stay resolvable once terminal.
    pub fn find_by_provider_message_id(
        &self,
        provider_message_id: &str,
    ) -> AppResult<DeliveryAttempt> {
        let attempt_id = self
            .by_provider_id
            .get(provider_message_id)
            .map(|entry| *entry.value())
            .ok_or_else(|| AppError::NotFound {
                entity: "delivery_attempt".to_string(),
                field: "provider_message_id".to_string(),
                value: provider_message_id.to_string(),
            })?;
        self.find_by_id(attempt_id)
    }

    /// Moves an attempt from `expected` to the transition's target state
    ///
    /// Fails with `InvalidTransition` without mutating when the attempt is no
    /// longer in `expected` or the state machine forbids the move.
    ///
    /// # Arguments
    /// * `attempt_id` - Attempt to update
    /// * `expected` - State the caller observed before deciding on the transition
    /// * `transition` - Target state and the fields it sets
    ///
    /// # Returns
    /// The updated attempt
    pub fn transition(
        &self,
        attempt_id: Uuid,
        expected: AttemptState,
        transition: Transition,
    ) -> AppResult<DeliveryAttempt> {
        let to = transition.target_state();
        let provider_message_id = match &transition {
            Transition::Sent {
                provider_message_id,
            } => Some(provider_message_id.clone()),
            _ => None,
        };

        let updated = {
            let mut entry = self
                .attempts
                .get_mut(&attempt_id)
                .ok_or_else(|| AppError::attempt_not_found(attempt_id))?;
            let attempt = entry.value_mut();
            let from = attempt.state;

            if from != expected || !from.can_transition_to(to) {
                tracing::debug!(
                    attempt_id = %attempt_id,
                    state = %from,
                    expected = %expected,
                    requested = %to,
                    "Transition rejected"
                );
                return Err(AppError::InvalidTransition {
                    attempt_id,
                    from,
                    to,
                });
            }

            attempt.apply(transition);
            if let Some(id) = provider_message_id {
                self.by_provider_id.insert(id, attempt_id);
            }
            attempt.clone()
        };

        tracing::info!(
            attempt_id = %attempt_id,
            from = %expected,
            state = %to,
            "Delivery attempt transitioned"
        );
        // No receivers is fine
        let _ = self.events.send(AttemptEvent {
            attempt_id,
            from: expected,
            to,
            at: updated.updated_at,
        });

        Ok(updated)
    }

    /// Counts one outbound provider call against a `Pending` attempt
    ///
    /// # Returns
    /// The new number of provider calls
    pub fn record_provider_attempt(&self, attempt_id: Uuid) -> AppResult<u32> {
        let mut entry = self
            .attempts
            .get_mut(&attempt_id)
            .ok_or_else(|| AppError::attempt_not_found(attempt_id))?;
        let attempt = entry.value_mut();
        if attempt.state != AttemptState::Pending {
            return Err(AppError::InvalidTransition {
                attempt_id,
                from: attempt.state,
                to: AttemptState::Pending,
            });
        }
        attempt.provider_attempts += 1;
        attempt.updated_at = jiff::Timestamp::now();
        Ok(attempt.provider_attempts)
    }

    /// Removes an attempt that never reached the provider
    ///
    /// Only `Pending` attempts can be discarded; anything else is kept for audit.
    pub fn discard(&self, attempt_id: Uuid) -> AppResult<DeliveryAttempt> {
        match self.attempts.entry(attempt_id) {
            Entry::Occupied(entry) if entry.get().state == AttemptState::Pending => {
                let attempt = entry.remove();
                tracing::info!(attempt_id = %attempt_id, "Pending delivery attempt discarded");
                Ok(attempt)
            }
            Entry::Occupied(entry) => Err(AppError::InvalidTransition {
                attempt_id,
                from: entry.get().state,
                to: AttemptState::Pending,
            }),
            Entry::Vacant(_) => Err(AppError::attempt_not_found(attempt_id)),
        }
    }

    /// Lists attempts newest first
    ///
    /// # Arguments
    /// * `state` - Optional state filter
    /// * `offset` - Number of records to skip
    /// * `limit` - Maximum number of records to return
    ///
    /// # Returns
    /// Tuple of (attempts, total matching count)
    pub fn list(
        &self,
        state: Option<AttemptState>,
        offset: usize,
        limit: usize,
    ) -> (Vec<DeliveryAttempt>, usize) {
        let mut matching: Vec<DeliveryAttempt> = self
            .attempts
            .iter()
            .filter(|entry| state.is_none_or(|s| entry.state == s))
            .map(|entry| entry.value().clone())
            .collect();
        let total = matching.len();

        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.attempt_id.cmp(&b.attempt_id))
        });
        let page = matching.into_iter().skip(offset).take(limit).collect();
        (page, total)
    }

    /// Counts attempts per state
    pub fn stats(&self) -> AttemptStats {
        let mut stats = AttemptStats::default();
        for entry in self.attempts.iter() {
            stats.record(entry.state);
        }
        stats
    }

    /// Subscribes to state change events emitted after every successful transition
    pub fn subscribe(&self) -> broadcast::Receiver<AttemptEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttemptError, ErrorKind, PayloadValue};
    use proptest::prelude::*;

    fn payload(title: &str) -> Payload {
        Payload::from([("title".to_string(), PayloadValue::from(title))])
    }

    fn sent(id: &str) -> Transition {
        Transition::Sent {
            provider_message_id: id.to_string(),
        }
    }

    fn failed(kind: ErrorKind) -> Transition {
        Transition::Failed {
            error: AttemptError::new(kind, "boom"),
        }
    }

    #[test]
    fn test_create_and_find() {
        let repo = AttemptRepository::new();
        let created = repo.create("tok-1".to_string(), payload("Hi"));

        let found = repo.find_by_id(created.attempt_id).unwrap();
        assert_eq!(found, created);
        assert_eq!(found.state, AttemptState::Pending);
    }

    #[test]
    fn test_find_unknown_is_not_found() {
        let repo = AttemptRepository::new();
        assert!(matches!(
            repo.find_by_id(Uuid::new_v4()),
            Err(AppError::NotFound { .. })
        ));
        assert!(matches!(
            repo.find_by_provider_message_id("projects/p/messages/missing"),
            Err(AppError::NotFound { .. })
        ));
    }

    #[test]
    fn test_transition_sets_fields_and_indexes() {
        let repo = AttemptRepository::new();
        let id = repo.create("tok-1".to_string(), payload("Hi")).attempt_id;

        let updated = repo
            .transition(id, AttemptState::Pending, sent("projects/p/messages/1"))
            .unwrap();
        assert_eq!(updated.state, AttemptState::Sent);
        assert_eq!(
            updated.provider_message_id.as_deref(),
            Some("projects/p/messages/1")
        );

        let by_provider = repo
            .find_by_provider_message_id("projects/p/messages/1")
            .unwrap();
        assert_eq!(by_provider.attempt_id, id);
    }

    #[test]
    fn test_invalid_transition_does_not_mutate() {
        let repo = AttemptRepository::new();
        let id = repo.create("tok-1".to_string(), payload("Hi")).attempt_id;
        let before = repo.find_by_id(id).unwrap();

        let err = repo
            .transition(id, AttemptState::Pending, Transition::Acknowledged)
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidTransition {
                from: AttemptState::Pending,
                to: AttemptState::Acknowledged,
                ..
            }
        ));
        assert_eq!(repo.find_by_id(id).unwrap(), before);
    }

    #[test]
    fn test_stale_expected_state_is_rejected() {
        let repo = AttemptRepository::new();
        let id = repo.create("tok-1".to_string(), payload("Hi")).attempt_id;
        repo.transition(id, AttemptState::Pending, failed(ErrorKind::Auth))
            .unwrap();

        let err = repo
            .transition(id, AttemptState::Pending, sent("projects/p/messages/1"))
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidTransition {
                from: AttemptState::Failed,
                ..
            }
        ));
    }

    #[test]
    fn test_index_survives_failure_after_sent() {
        let repo = AttemptRepository::new();
        let id = repo.create("tok-1".to_string(), payload("Hi")).attempt_id;
        repo.transition(id, AttemptState::Pending, sent("projects/p/messages/9"))
            .unwrap();
        repo.transition(id, AttemptState::Sent, failed(ErrorKind::Delivery))
            .unwrap();

        let attempt = repo
            .find_by_provider_message_id("projects/p/messages/9")
            .unwrap();
        assert_eq!(attempt.state, AttemptState::Failed);
        assert!(attempt.provider_message_id.is_none());
        assert!(attempt.is_consistent());
    }

    #[test]
    fn test_record_provider_attempt_only_while_pending() {
        let repo = AttemptRepository::new();
        let id = repo.create("tok-1".to_string(), payload("Hi")).attempt_id;
        assert_eq!(repo.record_provider_attempt(id).unwrap(), 1);
        assert_eq!(repo.record_provider_attempt(id).unwrap(), 2);

        repo.transition(id, AttemptState::Pending, sent("m-1")).unwrap();
        assert!(repo.record_provider_attempt(id).is_err());
        assert_eq!(repo.find_by_id(id).unwrap().provider_attempts, 2);
    }

    #[test]
    fn test_discard_only_pending() {
        let repo = AttemptRepository::new();
        let pending = repo.create("tok-1".to_string(), payload("a")).attempt_id;
        let sent_id = repo.create("tok-2".to_string(), payload("b")).attempt_id;
        repo.transition(sent_id, AttemptState::Pending, sent("m-2"))
            .unwrap();

        repo.discard(pending).unwrap();
        assert!(repo.find_by_id(pending).is_err());

        assert!(matches!(
            repo.discard(sent_id),
            Err(AppError::InvalidTransition { .. })
        ));
        assert!(repo.find_by_id(sent_id).is_ok());
        assert!(matches!(
            repo.discard(Uuid::new_v4()),
            Err(AppError::NotFound { .. })
        ));
    }

    #[test]
    fn test_list_filters_and_paginates() {
        let repo = AttemptRepository::new();
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(repo.create(format!("tok-{}", i), payload("x")).attempt_id);
        }
        repo.transition(ids[0], AttemptState::Pending, sent("m-0"))
            .unwrap();

        let (all, total) = repo.list(None, 0, 10);
        assert_eq!(total, 5);
        assert_eq!(all.len(), 5);
        assert!(all.windows(2).all(|w| w[0].created_at >= w[1].created_at));

        let (page, total) = repo.list(None, 3, 10);
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);

        let (sent_only, total) = repo.list(Some(AttemptState::Sent), 0, 10);
        assert_eq!(total, 1);
        assert_eq!(sent_only[0].attempt_id, ids[0]);
    }

    #[test]
    fn test_stats_counts_states() {
        let repo = AttemptRepository::new();
        let a = repo.create("a".to_string(), payload("x")).attempt_id;
        let b = repo.create("b".to_string(), payload("x")).attempt_id;
        repo.create("c".to_string(), payload("x"));
        repo.transition(a, AttemptState::Pending, sent("m-a")).unwrap();
        repo.transition(a, AttemptState::Sent, Transition::Acknowledged)
            .unwrap();
        repo.transition(b, AttemptState::Pending, failed(ErrorKind::Network))
            .unwrap();

        let stats = repo.stats();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.acknowledged, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total(), 3);
    }

    #[tokio::test]
    async fn test_subscribe_receives_transition_events() {
        let repo = AttemptRepository::new();
        let mut events = repo.subscribe();
        let id = repo.create("tok-1".to_string(), payload("Hi")).attempt_id;

        repo.transition(id, AttemptState::Pending, sent("m-1")).unwrap();
        repo.transition(id, AttemptState::Sent, Transition::Acknowledged)
            .unwrap();

        let first = events.recv().await.unwrap();
        assert_eq!(first.attempt_id, id);
        assert_eq!(
            (first.from, first.to),
            (AttemptState::Pending, AttemptState::Sent)
        );
        let second = events.recv().await.unwrap();
        assert_eq!(
            (second.from, second.to),
            (AttemptState::Sent, AttemptState::Acknowledged)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_transitions_have_one_winner() {
        let repo = AttemptRepository::new();
        let id = repo.create("tok-1".to_string(), payload("Hi")).attempt_id;
        repo.transition(id, AttemptState::Pending, sent("m-1")).unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                let transition = if i % 2 == 0 {
                    Transition::Acknowledged
                } else {
                    failed(ErrorKind::Delivery)
                };
                repo.transition(id, AttemptState::Sent, transition).is_ok()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        let attempt = repo.find_by_id(id).unwrap();
        assert!(attempt.state.is_terminal());
        assert!(attempt.is_consistent());
    }

    // ========================================================================
    // Property-based tests
    // ========================================================================

    fn arb_transition() -> impl Strategy<Value = (AttemptState, Transition)> {
        let state = prop::sample::select(AttemptState::ALL.to_vec());
        let transition = prop_oneof![
            "[a-z0-9]{1,8}".prop_map(|id| Transition::Sent {
                provider_message_id: id
            }),
            Just(Transition::Acknowledged),
            Just(failed(ErrorKind::Provider)),
        ];
        (state, transition)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Any sequence of requested transitions keeps the attempt consistent and
        /// only ever moves forward through the state machine.
        #[test]
        fn prop_transitions_preserve_invariants(
            steps in prop::collection::vec(arb_transition(), 0..12)
        ) {
            let repo = AttemptRepository::new();
            let id = repo.create("tok".to_string(), Payload::new()).attempt_id;

            for (expected, transition) in steps {
                let before = repo.find_by_id(id).unwrap();
                let to = transition.target_state();
                let result = repo.transition(id, expected, transition);
                let after = repo.find_by_id(id).unwrap();

                if result.is_ok() {
                    prop_assert!(before.state.can_transition_to(to));
                    prop_assert_eq!(after.state, to);
                } else {
                    prop_assert_eq!(&after, &before);
                }
                prop_assert!(after.is_consistent());
            }
        }
    }
}
