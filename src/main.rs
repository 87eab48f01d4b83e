//! upwatch - endpoint uptime monitor.

use upwatch::config::{MonitorConfig, ServerConfig};
use upwatch::db::Store;
use upwatch::probe::{Checkers, SystemPing};
use upwatch::scheduler::{Clock, Scheduler, SystemClock};
use upwatch::web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("upwatch=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    let monitor_cfg = MonitorConfig::load();
    tracing::info!("Starting upwatch on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);
    tracing::info!(
        "Probe settings: interval={:?} http_timeout={:?} tcp_timeout={:?} icmp_timeout={}s retention={:?}",
        monitor_cfg.interval,
        monitor_cfg.http_timeout,
        monitor_cfg.tcp_timeout,
        monitor_cfg.icmp_timeout_secs,
        monitor_cfg.retention
    );

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Start scheduler
    let checkers = Checkers::new(&monitor_cfg, Arc::new(SystemPing))?;
    let scheduler = Scheduler::new(store.clone(), &monitor_cfg, checkers, clock.clone());
    tokio::spawn(async move { scheduler.run().await });

    // Start web server
    let server = Server::new(cfg, store, clock);
    server.start().await?;

    Ok(())
}
