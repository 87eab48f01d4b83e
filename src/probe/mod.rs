//! Probe module for network monitoring.
//!
//! Supports HTTP, TCP, and ICMP probes. Every checker returns a
//! [`CheckOutcome`]; failures are values, never errors.

mod http;
mod icmp;
mod tcp;

pub use http::*;
pub use icmp::*;
pub use tcp::*;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::MonitorConfig;

/// Longest error message kept on an outcome.
pub const MAX_ERROR_LEN: usize = 512;

/// Probe error types. These never leave a checker; they are folded into a
/// failed [`CheckOutcome`].
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// The protocol used to probe an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    Http,
    Tcp,
    Icmp,
}

impl ProbeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::Http => "http",
            ProbeKind::Tcp => "tcp",
            ProbeKind::Icmp => "icmp",
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProbeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(ProbeKind::Http),
            "tcp" => Ok(ProbeKind::Tcp),
            "icmp" => Ok(ProbeKind::Icmp),
            other => Err(format!("unknown probe kind: {}", other)),
        }
    }
}

/// Normalized result of a single check.
///
/// `error` is set exactly when `success` is false.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub success: bool,
    pub status_code: Option<u16>,
    pub latency_ms: f64,
    pub error: Option<String>,
}

impl CheckOutcome {
    pub fn ok(status_code: Option<u16>, latency_ms: f64) -> Self {
        Self {
            success: true,
            status_code,
            latency_ms,
            error: None,
        }
    }

    pub fn failed(status_code: Option<u16>, latency_ms: f64, error: impl fmt::Display) -> Self {
        let mut message = error.to_string();
        if message.trim().is_empty() {
            message = "probe failed".to_string();
        }
        Self {
            success: false,
            status_code,
            latency_ms,
            error: Some(truncate(message, MAX_ERROR_LEN)),
        }
    }
}

/// The three protocol checkers, shared by every dispatched probe.
#[derive(Clone)]
pub struct Checkers {
    pub http: HttpChecker,
    pub tcp: TcpChecker,
    pub icmp: IcmpChecker,
}

impl Checkers {
    /// Build checkers from the monitor config, pinging through `ping_runner`.
    pub fn new(cfg: &MonitorConfig, ping_runner: Arc<dyn PingRunner>) -> Result<Self, ProbeError> {
        Ok(Self {
            http: HttpChecker::new(cfg.http_timeout)?,
            tcp: TcpChecker::new(cfg.tcp_timeout),
            icmp: IcmpChecker::new(ping_runner, cfg.icmp_timeout_secs),
        })
    }
}

/// Milliseconds elapsed since `start`.
pub(crate) fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Render an error together with its source chain, e.g.
/// `error sending request: tcp connect error: Connection refused`.
pub(crate) fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Cut a message to at most `max` characters.
pub(crate) fn truncate(mut message: String, max: usize) -> String {
    if let Some((idx, _)) = message.char_indices().nth(max) {
        message.truncate(idx);
    }
    message
}
