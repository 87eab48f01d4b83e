//! Web server module.

mod handlers;

pub use handlers::*;

use crate::config::ServerConfig;
use crate::db::Store;
use crate::scheduler::Clock;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub clock: Arc<dyn Clock>,
}

/// Build the router with all routes.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/healthz", get(handlers::handle_healthz))
        // API endpoints
        .route(
            "/api/endpoints",
            get(handlers::handle_list_endpoints).post(handlers::handle_create_endpoint),
        )
        .route("/api/endpoints/{id}", delete(handlers::handle_delete_endpoint))
        .route("/api/endpoints/{id}/outcomes", get(handlers::handle_list_outcomes))
        .route("/api/endpoints/{id}/uptime", get(handlers::handle_uptime))
        // Browser UI
        .route("/", get(handlers::handle_root))
        .route("/ui", get(handlers::handle_ui_index))
        .route("/ui/", get(handlers::handle_ui_index))
        .route("/ui/{*path}", get(handlers::handle_ui_asset))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .with_state(state)
}

/// Web server for upwatch.
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, store: Arc<Store>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            state: AppState { store, clock },
        }
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let router = router(self.state.clone());

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
