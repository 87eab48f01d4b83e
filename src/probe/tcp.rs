//! TCP connect probe implementation.

use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;

use super::{elapsed_ms, CheckOutcome, ProbeError};

/// Opens and immediately closes a TCP connection.
#[derive(Debug, Clone)]
pub struct TcpChecker {
    timeout: Duration,
}

impl TcpChecker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Succeeds iff a connection to `host:port` completes within the timeout.
    /// No data is sent. Never carries a status code.
    pub async fn check(&self, host: &str, port: u16) -> CheckOutcome {
        let start = Instant::now();
        let result = self.connect(host, port).await;
        let latency_ms = elapsed_ms(start);

        match result {
            Ok(()) => CheckOutcome::ok(None, latency_ms),
            Err(e) => CheckOutcome::failed(None, latency_ms, e),
        }
    }

    async fn connect(&self, host: &str, port: u16) -> Result<(), ProbeError> {
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))?
            .map_err(|e| ProbeError::Network(e.to_string()))?;
        drop(stream);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let checker = TcpChecker::new(Duration::from_secs(3));
        let outcome = checker.check("127.0.0.1", port).await;
        assert!(outcome.success);
        assert_eq!(outcome.status_code, None);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_tcp_closed_port_is_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let checker = TcpChecker::new(Duration::from_secs(3));
        let outcome = checker.check("127.0.0.1", port).await;
        assert!(!outcome.success);
        assert_eq!(outcome.status_code, None);
        let error = outcome.error.unwrap().to_lowercase();
        assert!(error.contains("refused"), "unexpected error: {}", error);
        assert!(outcome.latency_ms > 0.0);
    }

    #[tokio::test]
    async fn test_tcp_unresolvable_host() {
        let checker = TcpChecker::new(Duration::from_secs(3));
        let outcome = checker.check("no-such-host.invalid", 80).await;
        assert!(!outcome.success);
        assert!(!outcome.error.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tcp_timeout_is_bounded() {
        // 192.0.2.0/24 is reserved for documentation and never answers
        let checker = TcpChecker::new(Duration::from_millis(300));
        let outcome = checker.check("192.0.2.1", 9).await;
        assert!(!outcome.success);
        assert!(outcome.latency_ms <= 1_000.0);
    }
}
