use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use super::{CapabilitySet, PipelineState};

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("External service error: {0}")]
    ExternalService(String),
}

impl DomainError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn external(msg: impl Into<String>) -> Self {
        Self::ExternalService(msg.into())
    }
}

impl From<EmbeddingError> for DomainError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::EmptyInput => Self::validation(err.to_string()),
            _ => Self::external(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbeddingError {
    #[error("cannot embed empty input")]
    EmptyInput,

    #[error("embedding provider failed: {0}")]
    Provider(String),

    #[error("embedding has dimension {actual}, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl EmbeddingError {
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Only provider failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider(_))
    }
}

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("query has dimension {actual}, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("unsupported index format version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("index metric is {found}, expected {expected}")]
    MetricMismatch { expected: String, found: String },

    #[error("duplicate chunk id {0} in persisted index")]
    DuplicateId(Uuid),

    #[error("index is corrupt: {0}")]
    Corrupt(String),

    #[error("index has no persistence path configured")]
    NoPersistencePath,

    #[error("index io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("index serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RetrievalError {
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }
}

/// Failure reported by a single LLM provider call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("upstream error{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Upstream { status: Option<u16>, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Retryable,
    Fatal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderAttempt {
    pub provider: String,
    pub class: ErrorClass,
    pub error: ProviderError,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("no provider available for capabilities [{}]; {hint}", join_capabilities(.required))]
    NoProviderAvailable {
        required: CapabilitySet,
        hint: String,
    },

    #[error("all {} providers failed; {}", .0.len(), describe_last(.0))]
    AllProvidersFailed(Vec<ProviderAttempt>),
}

fn join_capabilities(caps: &CapabilitySet) -> String {
    caps.iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_last(attempts: &[ProviderAttempt]) -> String {
    attempts
        .last()
        .map(|a| format!("last: {}: {}", a.provider, a.error))
        .unwrap_or_else(|| "no attempts made".to_string())
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("prompt needs {required} characters before any context, budget is {budget}")]
pub struct PromptBudgetExceeded {
    pub required: usize,
    pub budget: usize,
}

#[derive(Error, Debug)]
pub enum PipelineFailure {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    PromptBudget(#[from] PromptBudgetExceeded),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("request cancelled")]
    Cancelled,
}

/// A failed orchestration run. Carries the stage it failed in and the full
/// transition trace up to and including `Failed`.
#[derive(Error, Debug)]
#[error("pipeline failed while {stage}: {failure}")]
pub struct PipelineError {
    pub stage: PipelineState,
    pub failure: PipelineFailure,
    pub transitions: Vec<PipelineState>,
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self.failure, PipelineFailure::Cancelled)
    }
}
