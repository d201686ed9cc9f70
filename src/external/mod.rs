//! Outbound integrations: OAuth credentials and the FCM HTTP v1 API.

pub mod client;
pub mod credentials;
pub mod fcm;

pub use client::build_http_client;
pub use credentials::{
    CredentialError, CredentialProvider, ServiceAccountCredentialProvider, ServiceAccountKey,
    StaticCredentialProvider,
};
pub use fcm::{FcmProvider, MessagingProvider, ProviderError};
