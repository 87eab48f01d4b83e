//! Retention enforcement for stored outcomes.

use crate::db::{DbError, Store};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Deletes outcomes older than the retention horizon.
#[derive(Clone)]
pub struct RetentionEnforcer {
    store: Arc<Store>,
    horizon: ChronoDuration,
}

impl RetentionEnforcer {
    pub fn new(store: Arc<Store>, horizon: Duration) -> Self {
        // Horizons beyond chrono's range keep everything
        let horizon = ChronoDuration::from_std(horizon).unwrap_or_else(|_| ChronoDuration::days(36_500));
        Self { store, horizon }
    }

    /// Outcomes strictly before this instant are expired.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.horizon)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Delete expired outcomes outside of a cycle commit.
    pub fn enforce(&self, now: DateTime<Utc>) -> Result<usize, DbError> {
        let cutoff = self.cutoff(now);
        let deleted = self.store.delete_outcomes_older_than(cutoff)?;
        if deleted > 0 {
            tracing::info!("RetentionEnforcer: deleted {} outcomes older than {}", deleted, cutoff);
        }
        Ok(deleted)
    }
}
