//! Stub credential and messaging providers shared by unit tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::external::{CredentialError, CredentialProvider, MessagingProvider, ProviderError};
use crate::models::Payload;

/// Credential provider returning a fixed token or a fixed error
pub struct StubCredentials {
    result: Result<String, String>,
    calls: AtomicUsize,
}

impl StubCredentials {
    pub fn ok() -> Self {
        Self {
            result: Ok("stub-token".to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for StubCredentials {
    async fn access_token(&self, _scope: &str) -> Result<String, CredentialError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
            .clone()
            .map_err(|message| CredentialError::Exchange {
                status: 503,
                message,
            })
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Messaging provider that plays back a script of results, then succeeds
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: AtomicUsize,
    last_access_token: Mutex<Option<String>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedProvider {
    pub fn healthy() -> Self {
        Self::scripted([])
    }

    pub fn scripted(script: impl IntoIterator<Item = Result<String, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: AtomicUsize::new(0),
            last_access_token: Mutex::new(None),
            gate: None,
        }
    }

    /// Every call blocks until [`release`](Self::release) is called
    pub fn held() -> Self {
        Self {
            gate: Some(Arc::new(Notify::new())),
            ..Self::healthy()
        }
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_access_token(&self) -> Option<String> {
        self.last_access_token.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingProvider for ScriptedProvider {
    async fn send_message(
        &self,
        access_token: &str,
        _target_token: &str,
        _payload: &Payload,
    ) -> Result<String, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_access_token.lock().unwrap() = Some(access_token.to_string());

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(format!("projects/test-project/messages/{}", call)))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Polls `condition` until it holds, yielding to background tasks in between
pub async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached in time");
}
