use std::time::{Duration, Instant};

use async_trait::async_trait;
use innkeeper_core::HealthProbe;
use innkeeper_domain::{HealthCheckResult, InnkeeperError, Result};
use reqwest::Client;
use tracing::debug;

/// Probes an HTTP endpoint with `GET`
///
/// 2xx is healthy, 5xx unhealthy, and any other status degraded (the
/// service answers but not as expected). Transport errors are unhealthy.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    url: String,
    client: Client,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InnkeeperError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(url, client))
    }

    /// Use a preconfigured client (proxy, TLS or timeout settings)
    pub fn with_client(url: impl Into<String>, client: Client) -> Self {
        Self { url: url.into(), client }
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn check(&self) -> HealthCheckResult {
        let started = Instant::now();
        let outcome = self.client.get(&self.url).send().await;
        let elapsed = started.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(response) => {
                let status = response.status();
                let details = format!("HTTP {}", status.as_u16());
                if status.is_success() {
                    HealthCheckResult::healthy(details)
                } else if status.is_server_error() {
                    HealthCheckResult::unhealthy(details, status.to_string())
                } else {
                    HealthCheckResult::degraded(details)
                }
            }
            Err(err) if err.is_timeout() => {
                HealthCheckResult::unhealthy("request timed out", err.to_string())
            }
            Err(err) => HealthCheckResult::unhealthy("request failed", err.to_string()),
        };

        debug!(url = %self.url, status = %result.status, elapsed_ms = elapsed, "HTTP probe");
        result.with_response_time(elapsed).with_metadata("url", self.url.clone())
    }
}
