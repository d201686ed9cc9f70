//! Firebase Cloud Messaging HTTP v1 provider.
//!
//! Sends one message per call to
//! `POST {endpoint}/v1/projects/{project_id}/messages:send`. The `name` in the
//! success response is the provider message id.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::config::FcmConfig;
use crate::models::Payload;

use super::credentials::MESSAGING_SCOPE;

/// Errors returned by a messaging provider call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider answered with a non-success status
    #[error("Provider rejected message with status {status}: {message}")]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// The provider could not be reached or the connection dropped
    #[error("Provider unreachable: {0}")]
    Network(String),

    /// The provider accepted the request but the response was unusable
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Only transport failures are retried; any answer from the provider is final
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Network(_))
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Outbound push messaging API
#[async_trait]
pub trait MessagingProvider: Send + Sync {
    /// Sends one message to a device
    ///
    /// # Arguments
    /// * `access_token` - Bearer token from the credential provider
    /// * `target_token` - Device registration token
    /// * `payload` - Validated notification payload
    ///
    /// # Returns
    /// The provider-assigned message id
    async fn send_message(
        &self,
        access_token: &str,
        target_token: &str,
        payload: &Payload,
    ) -> Result<String, ProviderError>;

    /// OAuth scope the access token must carry
    fn scope(&self) -> &str {
        MESSAGING_SCOPE
    }

    /// Returns the provider name for logging
    fn name(&self) -> &'static str;
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "errorCode", default)]
    error_code: Option<String>,
}

/// FCM HTTP v1 client
pub struct FcmProvider {
    client: reqwest::Client,
    send_url: String,
    android_channel_id: String,
    default_title: String,
    default_body: String,
}

impl FcmProvider {
    pub fn new(client: reqwest::Client, config: &FcmConfig) -> Self {
        let send_url = format!(
            "{}/v1/projects/{}/messages:send",
            config.endpoint.trim_end_matches('/'),
            config.project_id
        );
        Self {
            client,
            send_url,
            android_channel_id: config.android_channel_id.clone(),
            default_title: config.default_title.clone(),
            default_body: config.default_body.clone(),
        }
    }

    pub fn send_url(&self) -> &str {
        &self.send_url
    }

    /// Builds the v1 message body
    ///
    /// `title` and `body` go to the notification block, falling back to the
    /// configured defaults; every other key is stringified into `data`.
    pub fn build_message(&self, target_token: &str, payload: &Payload) -> Value {
        let title = payload
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.default_title);
        let body = payload
            .get("body")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.default_body);

        let data: Map<String, Value> = payload
            .iter()
            .filter(|(key, _)| key.as_str() != "title" && key.as_str() != "body")
            .map(|(key, value)| (key.clone(), Value::String(value.to_data_string())))
            .collect();

        json!({
            "message": {
                "token": target_token,
                "notification": {
                    "title": title,
                    "body": body,
                },
                "data": data,
                "android": {
                    "priority": "high",
                    "notification": {
                        "channel_id": self.android_channel_id,
                        "priority": "high",
                        "sound": "default",
                    },
                },
            }
        })
    }
}

fn parse_error(status: u16, body: &str) -> ProviderError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let code = envelope
                .error
                .details
                .iter()
                .find_map(|d| d.error_code.clone())
                .or(envelope.error.status);
            ProviderError::Rejected {
                status,
                code,
                message: envelope.error.message,
            }
        }
        Err(_) => ProviderError::Rejected {
            status,
            code: None,
            message: body.chars().take(512).collect(),
        },
    }
}

#[async_trait]
impl MessagingProvider for FcmProvider {
    async fn send_message(
        &self,
        access_token: &str,
        target_token: &str,
        payload: &Payload,
    ) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(&self.send_url)
            .bearer_auth(access_token)
            .json(&self.build_message(target_token, payload))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &body));
        }

        let body: SendResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        if body.name.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "response carried an empty message name".to_string(),
            ));
        }
        Ok(body.name)
    }

    fn name(&self) -> &'static str {
        "fcm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PayloadValue;
    use httpmock::prelude::*;

    fn config(endpoint: String) -> FcmConfig {
        FcmConfig {
            project_id: "test-project".to_string(),
            endpoint,
            ..FcmConfig::default()
        }
    }

    fn payload() -> Payload {
        Payload::from([
            ("title".to_string(), PayloadValue::from("Hi")),
            ("order_id".to_string(), PayloadValue::from(42i64)),
            ("urgent".to_string(), PayloadValue::from(true)),
        ])
    }

    #[test]
    fn test_send_url() {
        let provider = FcmProvider::new(
            reqwest::Client::new(),
            &config("https://fcm.example/".to_string()),
        );
        assert_eq!(
            provider.send_url(),
            "https://fcm.example/v1/projects/test-project/messages:send"
        );
    }

    #[test]
    fn test_build_message_shape() {
        let provider = FcmProvider::new(
            reqwest::Client::new(),
            &config("https://fcm.example".to_string()),
        );
        let message = provider.build_message("tok-1", &payload());

        assert_eq!(message["message"]["token"], "tok-1");
        assert_eq!(message["message"]["notification"]["title"], "Hi");
        assert_eq!(
            message["message"]["notification"]["body"],
            FcmConfig::default().default_body
        );
        assert_eq!(message["message"]["data"]["order_id"], "42");
        assert_eq!(message["message"]["data"]["urgent"], "true");
        assert!(message["message"]["data"].get("title").is_none());
        assert_eq!(message["message"]["android"]["priority"], "high");
        assert_eq!(
            message["message"]["android"]["notification"]["channel_id"],
            "default"
        );
        assert_eq!(
            message["message"]["android"]["notification"]["sound"],
            "default"
        );
    }

    #[tokio::test]
    async fn test_send_success_returns_message_name() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/projects/test-project/messages:send")
                    .header("authorization", "Bearer ya29.test")
                    .json_body_partial(r#"{"message":{"token":"tok-1","notification":{"title":"Hi"}}}"#);
                then.status(200)
                    .json_body(json!({"name": "projects/test-project/messages/0:1234"}));
            })
            .await;

        let provider = FcmProvider::new(reqwest::Client::new(), &config(server.base_url()));
        let name = provider
            .send_message("ya29.test", "tok-1", &payload())
            .await
            .unwrap();

        assert_eq!(name, "projects/test-project/messages/0:1234");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_rejected_extracts_fcm_error_code() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/projects/test-project/messages:send");
                then.status(404).json_body(json!({
                    "error": {
                        "code": 404,
                        "message": "Requested entity was not found.",
                        "status": "NOT_FOUND",
                        "details": [{
                            "@type": "type.googleapis.com/google.firebase.fcm.v1.FcmError",
                            "errorCode": "UNREGISTERED"
                        }]
                    }
                }));
            })
            .await;

        let provider = FcmProvider::new(reqwest::Client::new(), &config(server.base_url()));
        let err = provider
            .send_message("ya29.test", "tok-1", &payload())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ProviderError::Rejected {
                status: 404,
                code: Some("UNREGISTERED".to_string()),
                message: "Requested entity was not found.".to_string(),
            }
        );
        assert!(!err.is_transient());
        assert_eq!(err.status_code(), Some(404));
    }

    #[tokio::test]
    async fn test_server_error_is_not_transient() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(503).body("upstream unavailable");
            })
            .await;

        let provider = FcmProvider::new(reqwest::Client::new(), &config(server.base_url()));
        let err = provider
            .send_message("ya29.test", "tok-1", &payload())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProviderError::Rejected { status: 503, code: None, .. }
        ));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transient() {
        // Port 9 (discard) is not served by anything in the test environment
        let provider = FcmProvider::new(
            reqwest::Client::new(),
            &config("http://127.0.0.1:9".to_string()),
        );
        let err = provider
            .send_message("ya29.test", "tok-1", &payload())
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Network(_)));
        assert!(err.is_transient());
    }
}
