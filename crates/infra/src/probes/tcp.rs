use std::time::{Duration, Instant};

use async_trait::async_trait;
use innkeeper_core::HealthProbe;
use innkeeper_domain::HealthCheckResult;
use tokio::net::TcpStream;
use tracing::debug;

/// Healthy when a TCP connection to `address` opens within the timeout
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self { address: address.into(), timeout }
    }
}

#[async_trait]
impl HealthProbe for TcpProbe {
    async fn check(&self) -> HealthCheckResult {
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, TcpStream::connect(&self.address)).await;
        let elapsed = started.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(Ok(_stream)) => HealthCheckResult::healthy("connection established"),
            Ok(Err(err)) => HealthCheckResult::unhealthy("connection failed", err.to_string()),
            Err(_) => HealthCheckResult::unhealthy(
                "connection timed out",
                format!("no connection within {:?}", self.timeout),
            ),
        };

        debug!(address = %self.address, status = %result.status, elapsed_ms = elapsed, "TCP probe");
        result.with_response_time(elapsed).with_metadata("address", self.address.clone())
    }
}
