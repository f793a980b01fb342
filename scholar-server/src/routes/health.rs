//! Health check route

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DatabaseHealth {
    pub connected: bool,
    pub backend: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub database: DatabaseHealth,
}

/// GET /api/health
///
/// Always 200 while the process serves requests; a database outage shows up
/// as `connected: false`.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.indexer.store();
    let backend = store.backend();
    let connected = backend != "memory" && store.ping().await.is_ok();

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        database: DatabaseHealth { connected, backend },
    })
}
