//! Shared outbound HTTP client.

use std::time::Duration;

/// User agent sent on every outbound request
pub const USER_AGENT: &str = concat!("herald-rs/", env!("CARGO_PKG_VERSION"));

/// Builds the HTTP client shared by the credential and messaging providers
///
/// One client is built per process and cloned into each provider, so all
/// outbound calls share a connection pool.
///
/// # Features
/// - **Timeouts**: per-request timeout from configuration, 10s connect timeout
/// - **HTTP/2**: adaptive window sizing and keep-alive
/// - **Compression**: gzip responses
/// - **Security**: Rustls for TLS (no OpenSSL dependency)
///
/// # Arguments
/// * `request_timeout` - Upper bound for a whole request, including the body
pub fn build_http_client(request_timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        // Timeouts
        .timeout(request_timeout)
        .connect_timeout(Duration::from_secs(10))
        // Connection pooling
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        // HTTP/2 settings
        .http2_adaptive_window(true)
        .http2_keep_alive_interval(Duration::from_secs(10))
        .http2_keep_alive_timeout(Duration::from_secs(20))
        .gzip(true)
        .user_agent(USER_AGENT)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_initialization() {
        assert!(build_http_client(Duration::from_secs(5)).is_ok());
    }

    #[tokio::test]
    async fn test_client_sends_user_agent() {
        let server = httpmock::MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::GET)
                    .path("/ua")
                    .header("user-agent", USER_AGENT);
                then.status(204);
            })
            .await;

        let client = build_http_client(Duration::from_secs(5)).unwrap();
        let response = client.get(server.url("/ua")).send().await.unwrap();

        assert_eq!(response.status().as_u16(), 204);
        mock.assert_async().await;
    }
}
