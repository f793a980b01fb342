//! OpenAlex-backed search and paper lookup

use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use scholar_search::{SearchQuery, WorkSummary};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub limit: Option<usize>,
    pub year: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub limit: usize,
    pub count: usize,
    pub results: Vec<WorkSummary>,
}

/// GET /api/agent/acm/search?query=&limit=&year=
pub async fn search_works(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Query(params) = params?;
    let query = params
        .query
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::bad_request("query parameter is required"))?;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let works = state
        .openalex
        .search(&SearchQuery::new(&query).year(params.year).limit(limit))
        .await
        .map_err(|e| ApiError::Upstream {
            message: format!("{:#}", e),
        })?;

    let results: Vec<WorkSummary> = works.iter().take(limit).map(WorkSummary::from).collect();
    Ok(Json(SearchResponse {
        query,
        limit,
        count: results.len(),
        results,
    }))
}

#[derive(Debug, Serialize)]
pub struct PaperResponse {
    #[serde(flatten)]
    pub summary: WorkSummary,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    /// Whether the paper's text is in the store
    pub indexed: bool,
}

/// GET /api/agent/acm/papers/{id}
///
/// OpenAlex first; papers only known to the local store are still served.
pub async fn get_paper(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PaperResponse>, ApiError> {
    let record = state.indexer.store().get_paper(&id).await?;

    let work = match state.openalex.get_work(&id).await {
        Ok(work) => work,
        Err(e) if record.is_some() => {
            warn!("OpenAlex lookup for {} failed, serving the stored record: {:#}", id, e);
            None
        }
        Err(e) => {
            return Err(ApiError::Upstream {
                message: format!("{:#}", e),
            })
        }
    };

    let response = match (work, record) {
        (Some(work), record) => PaperResponse {
            abstract_text: work.abstract_text(),
            indexed: record.is_some(),
            summary: WorkSummary::from(&work),
        },
        (None, Some(record)) => PaperResponse {
            summary: WorkSummary {
                id: record.paper_id,
                title: record.title,
                authors: record.authors,
                year: record.year,
                citations: 0,
                doi: record.doi,
                pdf_url: None,
                is_acm: false,
            },
            abstract_text: record.abstract_text,
            indexed: true,
        },
        (None, None) => {
            return Err(ApiError::NotFound {
                resource: "paper",
                id,
            })
        }
    };
    Ok(Json(response))
}
