use anyhow::{Context, Result};
use std::time::Duration;
use tracing::debug;

/// Timeouts applied to every outbound inventory API call
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Upper bound for establishing the TCP/TLS connection
    pub connect_timeout: Duration,
    /// Upper bound for the whole request, response body included
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Build the shared HTTP client. `reqwest::Client` is reference counted, so
/// clones handed to each adapter share one connection pool.
pub fn build_http_client(config: &HttpClientConfig) -> Result<reqwest::Client> {
    debug!(
        connect_timeout_ms = config.connect_timeout.as_millis(),
        request_timeout_ms = config.request_timeout.as_millis(),
        "building http client"
    );

    reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .timeout(config.request_timeout)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .context("failed to build http client")
}
