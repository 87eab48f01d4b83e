//! Uptime aggregation over a trailing window.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;

use crate::db::{DbError, Store};

/// Success percentage for one endpoint over a trailing window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UptimeSummary {
    pub endpoint_id: i64,
    pub window_hours: u32,
    pub total_checks: i64,
    pub ok_checks: i64,
    pub uptime_percent: f64,
}

impl UptimeSummary {
    /// Count outcomes checked at or after `now - window_hours`.
    ///
    /// An empty window reports 100%: no data is not evidence of failure.
    pub fn compute(
        store: &Store,
        endpoint_id: i64,
        window_hours: u32,
        now: DateTime<Utc>,
    ) -> Result<Self, DbError> {
        let since = now - ChronoDuration::hours(i64::from(window_hours));
        let (total_checks, ok_checks) = store.outcome_counts(endpoint_id, since)?;

        Ok(Self {
            endpoint_id,
            window_hours,
            total_checks,
            ok_checks,
            uptime_percent: uptime_percent(ok_checks, total_checks),
        })
    }
}

/// Percentage rounded to two decimals.
pub fn uptime_percent(ok: i64, total: i64) -> f64 {
    if total <= 0 {
        return 100.0;
    }
    let pct = ok as f64 / total as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}
