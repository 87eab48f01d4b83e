//! Scheduler module for running probe cycles.
//!
//! Each cycle loads the enabled endpoints, probes them concurrently, and
//! commits the outcomes together with the retention delete in one
//! transaction. The loop then sleeps a fixed interval measured from the end
//! of the cycle, so the cadence drifts by each cycle's own duration.

mod clock;
mod dispatch;
mod retention;

pub use clock::*;
pub use dispatch::*;
pub use retention::*;

use crate::config::MonitorConfig;
use crate::db::{DbError, Store};
use crate::probe::Checkers;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Summary of one completed cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    /// Outcomes committed this cycle.
    pub probed: usize,
    /// Expired outcomes deleted this cycle.
    pub deleted: usize,
    pub elapsed: Duration,
}

/// The main scheduler that drives probe cycles.
pub struct Scheduler {
    store: Arc<Store>,
    dispatcher: Dispatcher,
    retention: RetentionEnforcer,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(
        store: Arc<Store>,
        cfg: &MonitorConfig,
        checkers: Checkers,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            dispatcher: Dispatcher::new(checkers, clock.clone()),
            retention: RetentionEnforcer::new(store.clone(), cfg.retention),
            store,
            clock,
            interval: cfg.interval,
        }
    }

    /// Override the per-check start jitter.
    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.dispatcher = self.dispatcher.with_jitter(max_jitter);
        self
    }

    /// Run one full cycle: probe, persist, and prune.
    ///
    /// On a store error nothing from this cycle is kept.
    pub async fn run_cycle(&self) -> Result<CycleReport, DbError> {
        let started = Instant::now();

        let endpoints = self.store.list_enabled_endpoints()?;
        let outcomes = self.dispatcher.dispatch(endpoints).await;

        let cutoff = self.retention.cutoff(self.clock.now());
        let commit = self.store.commit_cycle(&outcomes, cutoff)?;

        Ok(CycleReport {
            probed: commit.inserted,
            deleted: commit.deleted,
            elapsed: started.elapsed(),
        })
    }

    /// Run cycles until the process exits.
    pub async fn run(&self) {
        tracing::info!("Scheduler: starting, interval={:?}", self.interval);

        loop {
            match self.run_cycle().await {
                Ok(report) => tracing::info!(
                    probed = report.probed,
                    deleted = report.deleted,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "cycle complete"
                ),
                Err(e) => tracing::error!("Scheduler: cycle failed, outcomes discarded: {}", e),
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}
