//! Database model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::probe::ProbeKind;

/// A monitored endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: i64,
    pub name: String,
    /// Protocol kind as stored. Unknown kinds are kept so newer rows survive older binaries.
    pub kind: String,
    /// URL for http, host or IP otherwise.
    pub address: String,
    pub port: Option<u16>,
    pub enabled: bool,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            kind: ProbeKind::Http.as_str().to_string(),
            address: String::new(),
            port: None,
            enabled: true,
        }
    }
}

/// A request to create an endpoint, validated before it reaches the store.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEndpoint {
    pub name: String,
    pub kind: String,
    pub address: String,
    #[serde(default)]
    pub port: Option<u32>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl NewEndpoint {
    /// Check field bounds and the port-iff-tcp rule.
    pub fn validate(self) -> Result<Endpoint, String> {
        let name = self.name.trim();
        if name.is_empty() || name.chars().count() > 120 {
            return Err("name must be 1-120 characters".to_string());
        }

        let kind: ProbeKind = self.kind.parse()?;

        let address = self.address.trim();
        if address.is_empty() || address.chars().count() > 512 {
            return Err("address must be 1-512 characters".to_string());
        }

        let port = match self.port {
            Some(p) if (1..=65535).contains(&p) => Some(p as u16),
            Some(p) => return Err(format!("port {} is out of range 1-65535", p)),
            None => None,
        };

        match (kind, port) {
            (ProbeKind::Tcp, None) => return Err("TCP endpoint requires a port.".to_string()),
            (ProbeKind::Http | ProbeKind::Icmp, Some(_)) => {
                return Err("Port is only allowed for TCP endpoints.".to_string())
            }
            _ => {}
        }

        Ok(Endpoint {
            id: 0,
            name: name.to_string(),
            kind: kind.as_str().to_string(),
            address: address.to_string(),
            port,
            enabled: self.enabled,
        })
    }
}

/// The stored result of one probe of one endpoint. Never updated once written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeOutcome {
    /// Row id, 0 until persisted.
    pub id: i64,
    pub endpoint_id: i64,
    pub success: bool,
    pub status_code: Option<u16>,
    pub latency_ms: f64,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// Row counts from one atomic cycle commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleCommit {
    pub inserted: usize,
    pub deleted: usize,
}
