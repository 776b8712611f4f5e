use axum::{http::StatusCode, Json};
use serde::Serialize;

use crate::domain::{
    DispatchError, DomainError, EmbeddingError, ErrorClass, PipelineError, PipelineFailure,
    PipelineState, ProviderAttempt, RetrievalError,
};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<PipelineState>,
    /// Failed provider calls in the order they were made.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<AttemptSummary>,
}

#[derive(Debug, Serialize)]
pub struct AttemptSummary {
    pub provider: String,
    pub class: ErrorClass,
    pub error: String,
}

impl From<&ProviderAttempt> for AttemptSummary {
    fn from(attempt: &ProviderAttempt) -> Self {
        Self {
            provider: attempt.provider.clone(),
            class: attempt.class,
            error: attempt.error.to_string(),
        }
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn respond(status: StatusCode, error: String, stage: Option<PipelineState>) -> ApiError {
    respond_with_attempts(status, error, stage, Vec::new())
}

fn respond_with_attempts(
    status: StatusCode,
    error: String,
    stage: Option<PipelineState>,
    attempts: Vec<AttemptSummary>,
) -> ApiError {
    if status.is_server_error() {
        tracing::error!(status = %status, error = %error, "Request failed");
    } else {
        tracing::warn!(status = %status, error = %error, "Request rejected");
    }
    (
        status,
        Json(ErrorResponse {
            error,
            stage,
            attempts,
        }),
    )
}

fn domain_status(e: &DomainError) -> StatusCode {
    match e {
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::Conflict(_) => StatusCode::CONFLICT,
        DomainError::ExternalService(_) => StatusCode::BAD_GATEWAY,
        DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn retrieval_status(e: &RetrievalError) -> StatusCode {
    match e {
        RetrievalError::DimensionMismatch { .. }
        | RetrievalError::UnsupportedVersion { .. }
        | RetrievalError::MetricMismatch { .. }
        | RetrievalError::DuplicateId(_)
        | RetrievalError::Corrupt(_) => StatusCode::UNPROCESSABLE_ENTITY,
        RetrievalError::NoPersistencePath
        | RetrievalError::Io(_)
        | RetrievalError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn domain_error(e: DomainError) -> ApiError {
    respond(domain_status(&e), e.to_string(), None)
}

pub fn retrieval_error(e: RetrievalError) -> ApiError {
    respond(retrieval_status(&e), e.to_string(), None)
}

pub fn pipeline_error(e: PipelineError) -> ApiError {
    let status = match &e.failure {
        PipelineFailure::Dispatch(DispatchError::NoProviderAvailable { .. }) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        PipelineFailure::Dispatch(DispatchError::AllProvidersFailed(_)) => StatusCode::BAD_GATEWAY,
        PipelineFailure::Retrieval(inner) => retrieval_status(inner),
        PipelineFailure::Embedding(EmbeddingError::EmptyInput) => StatusCode::BAD_REQUEST,
        PipelineFailure::Embedding(_) => StatusCode::BAD_GATEWAY,
        PipelineFailure::PromptBudget(_) | PipelineFailure::Cancelled => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let attempts = match &e.failure {
        PipelineFailure::Dispatch(DispatchError::AllProvidersFailed(attempts)) => {
            attempts.iter().map(AttemptSummary::from).collect()
        }
        _ => Vec::new(),
    };
    respond_with_attempts(status, e.to_string(), Some(e.stage), attempts)
}
