//! Configuration module for upwatch.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "upwatch.db")
    pub db_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "upwatch.db".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `UPWATCH_HTTP_PORT`: HTTP port (default: 8080)
    /// - `UPWATCH_DB_PATH`: Database file path (default: "upwatch.db")
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(port) = parse_positive(&lookup, "UPWATCH_HTTP_PORT") {
            cfg.http_port = port;
        }

        if let Some(db_path) = lookup("UPWATCH_DB_PATH").filter(|p| !p.trim().is_empty()) {
            cfg.db_path = db_path;
        }

        cfg
    }
}

/// Cadence, checker timeouts and retention for the probe scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Sleep between the end of one cycle and the start of the next.
    pub interval: Duration,
    pub http_timeout: Duration,
    pub tcp_timeout: Duration,
    /// Passed to ping as whole seconds.
    pub icmp_timeout_secs: u64,
    /// Outcomes older than this are deleted at the end of each cycle.
    pub retention: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            http_timeout: Duration::from_secs(5),
            tcp_timeout: Duration::from_secs(3),
            icmp_timeout_secs: 3,
            retention: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `UPWATCH_INTERVAL_SECONDS` (default: 30)
    /// - `UPWATCH_HTTP_TIMEOUT_SECONDS` (default: 5, fractional allowed)
    /// - `UPWATCH_TCP_TIMEOUT_SECONDS` (default: 3, fractional allowed)
    /// - `UPWATCH_ICMP_TIMEOUT_SECONDS` (default: 3)
    /// - `UPWATCH_RETENTION_DAYS` (default: 7)
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(secs) = parse_positive::<u64, _>(&lookup, "UPWATCH_INTERVAL_SECONDS") {
            cfg.interval = Duration::from_secs(secs);
        }
        if let Some(timeout) = parse_seconds(&lookup, "UPWATCH_HTTP_TIMEOUT_SECONDS") {
            cfg.http_timeout = timeout;
        }
        if let Some(timeout) = parse_seconds(&lookup, "UPWATCH_TCP_TIMEOUT_SECONDS") {
            cfg.tcp_timeout = timeout;
        }
        if let Some(secs) = parse_positive(&lookup, "UPWATCH_ICMP_TIMEOUT_SECONDS") {
            cfg.icmp_timeout_secs = secs;
        }
        if let Some(secs) = parse_positive::<u64, _>(&lookup, "UPWATCH_RETENTION_DAYS")
            .and_then(|days| days.checked_mul(24 * 60 * 60))
        {
            cfg.retention = Duration::from_secs(secs);
        }

        cfg
    }
}

fn parse_seconds<F>(lookup: &F, key: &str) -> Option<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    parse_positive::<f64, _>(lookup, key).and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

/// Parse a strictly positive value, warning and returning `None` on garbage.
fn parse_positive<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr + PartialOrd + Default + Copy,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) if v > T::default() => Some(v),
        _ => {
            tracing::warn!("Ignoring invalid value {:?} for {}, using default", raw, key);
            None
        }
    }
}
