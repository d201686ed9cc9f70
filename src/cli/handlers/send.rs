//! Send command handler
//!
//! Runs one notification through the configured pipeline and prints the
//! resulting attempt as JSON, including failed attempts.

use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};
use crate::models::{DeliveryAttempt, Payload, PayloadValue};
use crate::services::Services;

/// Handler for the send command
pub struct SendCommandHandler {
    config: Settings,
}

impl SendCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Dispatches one notification and prints the attempt
    ///
    /// When the dispatch fails after the attempt was created, the failed
    /// attempt is printed before the error is returned.
    pub async fn execute(&self, target_token: &str, payload: Payload) -> AppResult<DeliveryAttempt> {
        let services = Services::from_settings(&self.config)?;
        let deliveries = &services.deliveries;

        match deliveries.send(target_token, payload).await {
            Ok(attempt) => {
                print_attempt(&attempt)?;
                Ok(attempt)
            }
            Err(err) => {
                if let Some(attempt_id) = err.attempt_id()
                    && let Ok(attempt) = deliveries.get(attempt_id)
                {
                    print_attempt(&attempt)?;
                }
                Err(err)
            }
        }
    }
}

/// Assembles a payload from `--title`, `--body` and `--data` values
pub fn build_payload(
    title: Option<&str>,
    body: Option<&str>,
    data: &[(String, String)],
) -> Payload {
    let mut payload: Payload = data
        .iter()
        .map(|(key, value)| (key.clone(), PayloadValue::from(value.as_str())))
        .collect();
    if let Some(title) = title {
        payload.insert("title".to_string(), title.into());
    }
    if let Some(body) = body {
        payload.insert("body".to_string(), body.into());
    }
    payload
}

fn print_attempt(attempt: &DeliveryAttempt) -> AppResult<()> {
    let json = serde_json::to_string_pretty(attempt).map_err(|e| AppError::Internal {
        source: e.into(),
    })?;
    println!("{}", json);
    Ok(())
}
