//! Axum router and HTTP handlers for csp-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers so tests can use the bare router.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use crate::{
    api_types::{ErrorResponse, HealthResponse, StatusResponse},
    state::{uptime_secs, AppState},
};

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/compliance", get(compliance))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let snap = st.status.borrow().clone();
    Json(StatusResponse {
        daemon_uptime_secs: uptime_secs(),
        config_hash: snap.config_hash,
        interval_secs: snap.interval_secs,
        passes_total: snap.passes_total,
        passes_failed: snap.passes_failed,
        last_pass: snap.last_pass,
    })
}

// ---------------------------------------------------------------------------
// GET /v1/compliance
// ---------------------------------------------------------------------------

pub(crate) async fn compliance(State(st): State<Arc<AppState>>) -> Response {
    let report = st.last_report.borrow().clone();
    match report {
        Some(report) => (StatusCode::OK, Json(report)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "no compliance report published yet".to_string(),
            }),
        )
            .into_response(),
    }
}
