use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use scholar_chat::{answer_question, Answer};
use serde::Deserialize;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    pub paper_id: Option<String>,
}

/// POST /api/agent/acm/ask
pub async fn ask(
    State(state): State<AppState>,
    request: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<Answer>, ApiError> {
    let Json(request) = request?;
    let question = request.question.trim();
    if question.is_empty() {
        return Err(ApiError::bad_request("question must not be empty"));
    }
    let model = state.model.as_ref().ok_or_else(|| ApiError::Unavailable {
        message: "question answering is not configured (set GEMINI_API_KEY)".into(),
    })?;

    let paper_id = request
        .paper_id
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());
    info!(paper_id = ?paper_id, "Answering question");

    let answer = answer_question(model.as_ref(), Some(&state.indexer), question, paper_id, &[]).await?;
    Ok(Json(answer))
}
