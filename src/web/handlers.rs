//! HTTP request handlers.

use super::AppState;
use crate::db::{DbError, NewEndpoint};
use crate::uptime::UptimeSummary;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
};
use rust_embed::RustEmbed;
use serde::Deserialize;
use serde_json::json;

#[derive(RustEmbed)]
#[folder = "static/"]
struct Assets;

fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": detail.into() }))).into_response()
}

fn db_error_response(e: DbError) -> Response {
    match e {
        DbError::NotFound => error_response(StatusCode::NOT_FOUND, "Endpoint not found"),
        other => {
            tracing::error!("Store error: {}", other);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

pub async fn handle_healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

// ============================================================================
// API: Endpoints
// ============================================================================

pub async fn handle_list_endpoints(State(state): State<AppState>) -> Response {
    match state.store.list_endpoints() {
        Ok(endpoints) => Json(endpoints).into_response(),
        Err(e) => db_error_response(e),
    }
}

pub async fn handle_create_endpoint(
    State(state): State<AppState>,
    Json(req): Json<NewEndpoint>,
) -> Response {
    let mut endpoint = match req.validate() {
        Ok(endpoint) => endpoint,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, msg),
    };

    match state.store.add_endpoint(&mut endpoint) {
        Ok(_) => {
            tracing::info!("Added endpoint {} ({} {})", endpoint.id, endpoint.kind, endpoint.address);
            Json(endpoint).into_response()
        }
        Err(e) => db_error_response(e),
    }
}

pub async fn handle_delete_endpoint(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.store.delete_endpoint(id) {
        Ok(()) => Json(json!({ "ok": true, "deleted_endpoint_id": id })).into_response(),
        Err(e) => db_error_response(e),
    }
}

// ============================================================================
// API: Outcomes and uptime
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct OutcomesQuery {
    #[serde(default)]
    pub limit: Option<u32>,
}

pub async fn handle_list_outcomes(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<OutcomesQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(20);
    if !(1..=200).contains(&limit) {
        return error_response(StatusCode::BAD_REQUEST, "limit must be between 1 and 200");
    }

    if let Err(e) = state.store.get_endpoint(id) {
        return db_error_response(e);
    }

    match state.store.recent_outcomes(id, limit) {
        Ok(outcomes) => Json(outcomes).into_response(),
        Err(e) => db_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct UptimeQuery {
    #[serde(default)]
    pub hours: Option<u32>,
}

pub async fn handle_uptime(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<UptimeQuery>,
) -> Response {
    let hours = query.hours.unwrap_or(24);
    if !(1..=720).contains(&hours) {
        return error_response(StatusCode::BAD_REQUEST, "hours must be between 1 and 720");
    }

    if let Err(e) = state.store.get_endpoint(id) {
        return db_error_response(e);
    }

    match UptimeSummary::compute(&state.store, id, hours, state.clock.now()) {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => db_error_response(e),
    }
}

// ============================================================================
// Static UI
// ============================================================================

pub async fn handle_root() -> Redirect {
    Redirect::temporary("/ui/")
}

pub async fn handle_ui_index() -> Response {
    serve_asset("index.html")
}

pub async fn handle_ui_asset(Path(path): Path<String>) -> Response {
    if path.is_empty() {
        return serve_asset("index.html");
    }
    serve_asset(&path)
}

fn serve_asset(path: &str) -> Response {
    match Assets::get(path) {
        Some(file) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.as_ref().to_string())], file.data).into_response()
        }
        None => error_response(StatusCode::NOT_FOUND, "Not found"),
    }
}
