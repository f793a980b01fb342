use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct LibraryStatsResponse {
    pub backend: &'static str,
    pub paper_count: u64,
    pub chunk_count: u64,
}

/// GET /api/library/stats
pub async fn library_stats(State(state): State<AppState>) -> Result<Json<LibraryStatsResponse>, ApiError> {
    let store = state.indexer.store();
    let stats = store.stats().await?;
    Ok(Json(LibraryStatsResponse {
        backend: store.backend(),
        paper_count: stats.paper_count,
        chunk_count: stats.chunk_count,
    }))
}
