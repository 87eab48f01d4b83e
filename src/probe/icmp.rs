//! Ping probe implementation via the platform `ping` command.
//!
//! The subprocess is reached through [`PingRunner`] so tests can substitute
//! canned output. A hard timeout one second past the ping timeout guards
//! against a hung child process.

use std::io;
use std::process::Stdio;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tokio::time::Instant;

use super::{elapsed_ms, CheckOutcome};

/// Captured result of one ping invocation.
#[derive(Debug, Clone, Default)]
pub struct PingOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs a single-packet ping against a host.
#[async_trait]
pub trait PingRunner: Send + Sync {
    /// Send one echo request and wait at most `timeout_secs` for the reply.
    /// Dropping the returned future must stop the ping.
    async fn ping(&self, host: &str, timeout_secs: u64) -> io::Result<PingOutput>;
}

/// [`PingRunner`] backed by the system `ping` binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPing;

#[async_trait]
impl PingRunner for SystemPing {
    async fn ping(&self, host: &str, timeout_secs: u64) -> io::Result<PingOutput> {
        let output = Command::new("ping")
            .args(ping_args(host, timeout_secs))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(PingOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(target_os = "windows")]
fn ping_args(host: &str, timeout_secs: u64) -> Vec<String> {
    let millis = timeout_secs.saturating_mul(1000);
    vec!["-n".into(), "1".into(), "-w".into(), millis.to_string(), host.into()]
}

#[cfg(any(target_os = "macos", target_os = "freebsd"))]
fn ping_args(host: &str, timeout_secs: u64) -> Vec<String> {
    vec!["-c".into(), "1".into(), "-t".into(), timeout_secs.to_string(), host.into()]
}

#[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "freebsd")))]
fn ping_args(host: &str, timeout_secs: u64) -> Vec<String> {
    vec!["-c".into(), "1".into(), "-W".into(), timeout_secs.to_string(), host.into()]
}

/// ICMP reachability checker.
#[derive(Clone)]
pub struct IcmpChecker {
    runner: Arc<dyn PingRunner>,
    timeout_secs: u64,
}

impl IcmpChecker {
    pub fn new(runner: Arc<dyn PingRunner>, timeout_secs: u64) -> Self {
        Self {
            runner,
            timeout_secs: timeout_secs.max(1),
        }
    }

    /// Wall-clock bound on the ping subprocess.
    pub fn hard_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.saturating_add(1))
    }

    /// Ping `host` once. Never carries a status code.
    pub async fn check(&self, host: &str) -> CheckOutcome {
        let start = Instant::now();

        // A leading dash would be read by ping as an option
        if host.is_empty() || host.starts_with('-') {
            return CheckOutcome::failed(None, elapsed_ms(start), format!("invalid host {:?}", host));
        }

        let result = tokio::time::timeout(
            self.hard_timeout(),
            self.runner.ping(host, self.timeout_secs),
        )
        .await;
        let latency_ms = elapsed_ms(start);

        match result {
            Err(_) => CheckOutcome::failed(None, latency_ms, "ping timed out"),
            Ok(Err(e)) => CheckOutcome::failed(None, latency_ms, format!("failed to execute ping: {}", e)),
            Ok(Ok(output)) if output.code == Some(0) => {
                let rtt = parse_ping_output(&output.stdout).unwrap_or(latency_ms);
                CheckOutcome::ok(None, rtt)
            }
            Ok(Ok(output)) => {
                let stderr = output.stderr.trim();
                if stderr.is_empty() {
                    let rc = output.code.unwrap_or(-1);
                    CheckOutcome::failed(None, latency_ms, format!("ping failed (rc={})", rc))
                } else {
                    CheckOutcome::failed(None, latency_ms, stderr)
                }
            }
        }
    }
}

/// Parse the round-trip time in milliseconds from ping output.
fn parse_ping_output(output: &str) -> Option<f64> {
    // Per-packet response "time=X.XXX ms" (Linux, macOS) or "time<1ms" (Windows)
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"time[=<](?P<val>[0-9]+(?:\.[0-9]+)?)\s*ms").expect("ping time pattern is valid")
    });

    re.captures(output)
        .and_then(|caps| caps.name("val"))
        .and_then(|val| val.as_str().parse::<f64>().ok())
}
