//! HTTP probe implementation.

use std::time::Duration;
use tokio::time::Instant;

use super::{elapsed_ms, error_chain, CheckOutcome, ProbeError};

/// Issues GET requests, following redirects, with a whole-request timeout.
#[derive(Clone)]
pub struct HttpChecker {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpChecker {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .no_proxy()
            .build()
            .map_err(|e| ProbeError::Config(e.to_string()))?;
        Ok(Self { client, timeout })
    }

    /// Probe the given address.
    ///
    /// Succeeds iff the final response status is in [200, 400).
    pub async fn check(&self, address: &str) -> CheckOutcome {
        let url = if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        };

        let start = Instant::now();
        let result = self.fetch(&url).await;
        let latency_ms = elapsed_ms(start);

        match result {
            Ok(status) if (200..400).contains(&status.as_u16()) => {
                CheckOutcome::ok(Some(status.as_u16()), latency_ms)
            }
            Ok(status) => CheckOutcome::failed(
                Some(status.as_u16()),
                latency_ms,
                format!("unexpected status {}", status),
            ),
            Err(e) => CheckOutcome::failed(None, latency_ms, e),
        }
    }

    async fn fetch(&self, url: &str) -> Result<reqwest::StatusCode, ProbeError> {
        let response = self.client.get(url).send().await.map_err(|e| self.map_err(e))?;
        let status = response.status();

        // Read the full body so latency covers the complete transfer
        response.bytes().await.map_err(|e| self.map_err(e))?;

        Ok(status)
    }

    fn map_err(&self, e: reqwest::Error) -> ProbeError {
        if e.is_timeout() {
            ProbeError::Timeout(self.timeout)
        } else {
            ProbeError::Network(error_chain(&e))
        }
    }
}
