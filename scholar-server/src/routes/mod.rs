//! Route handlers organized by resource

pub mod ask;
pub mod health;
pub mod library;
pub mod search;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Everything under `/api`
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/agent/acm/search", get(search::search_works))
        .route("/agent/acm/papers/{id}", get(search::get_paper))
        .route("/agent/acm/ask", post(ask::ask))
        .route("/library/stats", get(library::library_stats))
}
