//! Routes enabled endpoints to their protocol checker.

use crate::db::{Endpoint, ProbeOutcome};
use crate::probe::{CheckOutcome, Checkers, ProbeKind};

use super::Clock;

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// What a checker needs to probe one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeTarget {
    Http { url: String },
    Tcp { host: String, port: u16 },
    Icmp { host: String },
}

impl ProbeTarget {
    /// Map an endpoint to its target, or `None` when it cannot be probed.
    pub fn from_endpoint(endpoint: &Endpoint) -> Option<Self> {
        let kind = match endpoint.kind.parse::<ProbeKind>() {
            Ok(kind) => kind,
            Err(_) => {
                tracing::debug!(
                    "Dispatcher: skipping {} (id={}), unsupported kind {:?}",
                    endpoint.name,
                    endpoint.id,
                    endpoint.kind
                );
                return None;
            }
        };

        match kind {
            ProbeKind::Http => Some(ProbeTarget::Http {
                url: endpoint.address.clone(),
            }),
            ProbeKind::Tcp => match endpoint.port {
                Some(port) => Some(ProbeTarget::Tcp {
                    host: endpoint.address.clone(),
                    port,
                }),
                None => {
                    tracing::warn!(
                        "Dispatcher: skipping tcp endpoint {} (id={}) without a port",
                        endpoint.name,
                        endpoint.id
                    );
                    None
                }
            },
            ProbeKind::Icmp => Some(ProbeTarget::Icmp {
                host: endpoint.address.clone(),
            }),
        }
    }

    async fn run(&self, checkers: &Checkers) -> CheckOutcome {
        match self {
            ProbeTarget::Http { url } => checkers.http.check(url).await,
            ProbeTarget::Tcp { host, port } => checkers.tcp.check(host, *port).await,
            ProbeTarget::Icmp { host } => checkers.icmp.check(host).await,
        }
    }
}

/// Runs one check per endpoint concurrently and gathers the outcomes.
#[derive(Clone)]
pub struct Dispatcher {
    checkers: Arc<Checkers>,
    clock: Arc<dyn Clock>,
    max_jitter: Duration,
}

impl Dispatcher {
    pub fn new(checkers: Checkers, clock: Arc<dyn Clock>) -> Self {
        Self {
            checkers: Arc::new(checkers),
            clock,
            max_jitter: Duration::from_millis(100),
        }
    }

    /// Upper bound of the random delay before each check starts.
    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Probe every endpoint once.
    ///
    /// Yields at most one outcome per endpoint, sorted by endpoint id.
    /// Endpoints that cannot be routed produce nothing.
    pub async fn dispatch(&self, endpoints: Vec<Endpoint>) -> Vec<ProbeOutcome> {
        let mut tasks = JoinSet::new();

        for endpoint in endpoints {
            let Some(target) = ProbeTarget::from_endpoint(&endpoint) else {
                continue;
            };

            let checkers = self.checkers.clone();
            let clock = self.clock.clone();
            let jitter = self.jitter();

            tasks.spawn(async move {
                if !jitter.is_zero() {
                    tokio::time::sleep(jitter).await;
                }

                let result = target.run(&checkers).await;

                tracing::info!(
                    endpoint_id = endpoint.id,
                    name = %endpoint.name,
                    kind = %endpoint.kind,
                    success = result.success,
                    status_code = ?result.status_code,
                    latency_ms = result.latency_ms,
                    error = ?result.error,
                    "probe completed"
                );

                ProbeOutcome {
                    id: 0,
                    endpoint_id: endpoint.id,
                    success: result.success,
                    status_code: result.status_code,
                    latency_ms: result.latency_ms,
                    error: result.error,
                    checked_at: clock.now(),
                }
            });
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => tracing::error!("Dispatcher: probe task failed: {}", e),
            }
        }

        outcomes.sort_by_key(|o| o.endpoint_id);
        outcomes
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::random::<u64>() % (max_ms + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::probe::{PingOutput, PingRunner};
    use crate::scheduler::SystemClock;
    use async_trait::async_trait;
    use tokio::net::TcpListener;

    struct AlwaysUp;

    #[async_trait]
    impl PingRunner for AlwaysUp {
        async fn ping(&self, _host: &str, _timeout_secs: u64) -> std::io::Result<PingOutput> {
            Ok(PingOutput {
                code: Some(0),
                stdout: "time=1.5 ms".to_string(),
                stderr: String::new(),
            })
        }
    }

    fn dispatcher() -> Dispatcher {
        let checkers = Checkers::new(&MonitorConfig::default(), Arc::new(AlwaysUp)).unwrap();
        Dispatcher::new(checkers, Arc::new(SystemClock)).with_jitter(Duration::ZERO)
    }

    fn endpoint(id: i64, kind: &str, address: &str, port: Option<u16>) -> Endpoint {
        Endpoint {
            id,
            name: format!("ep-{}", id),
            kind: kind.to_string(),
            address: address.to_string(),
            port,
            enabled: true,
        }
    }

    #[test]
    fn test_target_routing() {
        assert_eq!(
            ProbeTarget::from_endpoint(&endpoint(1, "tcp", "db", Some(5432))),
            Some(ProbeTarget::Tcp { host: "db".to_string(), port: 5432 })
        );
        assert_eq!(
            ProbeTarget::from_endpoint(&endpoint(2, "icmp", "10.0.0.1", None)),
            Some(ProbeTarget::Icmp { host: "10.0.0.1".to_string() })
        );
        assert_eq!(ProbeTarget::from_endpoint(&endpoint(3, "tcp", "db", None)), None);
        assert_eq!(ProbeTarget::from_endpoint(&endpoint(4, "dns", "1.1.1.1", None)), None);
    }

    #[tokio::test]
    async fn test_dispatch_one_outcome_per_routable_endpoint() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let outcomes = dispatcher()
            .dispatch(vec![
                endpoint(3, "icmp", "10.0.0.1", None),
                endpoint(1, "tcp", "127.0.0.1", Some(port)),
                endpoint(2, "tcp", "127.0.0.1", None),
                endpoint(4, "smtp", "mail", None),
            ])
            .await;

        let ids: Vec<_> = outcomes.iter().map(|o| o.endpoint_id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(outcomes.iter().all(|o| o.success && o.error.is_none()));
        assert_eq!(outcomes[1].latency_ms, 1.5);
    }

    #[tokio::test]
    async fn test_dispatch_empty() {
        assert!(dispatcher().dispatch(Vec::new()).await.is_empty());
    }
}
