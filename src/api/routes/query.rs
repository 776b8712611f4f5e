use axum::{extract::State, Json};
use serde::Serialize;

use crate::api::error::{pipeline_error, ApiError};
use crate::api::state::AppState;
use crate::domain::{Citation, Language, PipelineRequest, PipelineState};

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    /// The answer with its numbered sources appended.
    pub answer_with_sources: String,
    pub provider: String,
    pub language: Language,
    pub citations: Vec<Citation>,
    pub transitions: Vec<PipelineState>,
}

pub async fn query_handler(
    State(state): State<AppState>,
    Json(request): Json<PipelineRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let response = state
        .orchestrator
        .query(request)
        .await
        .map_err(pipeline_error)?;

    Ok(Json(QueryResponse {
        answer_with_sources: response.answer_with_sources(),
        answer: response.answer,
        provider: response.provider,
        language: response.language,
        citations: response.citations,
        transitions: response.transitions,
    }))
}
