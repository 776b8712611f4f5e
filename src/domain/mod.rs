pub mod entities;
pub mod errors;
pub mod ports;

pub use entities::*;
pub use errors::{
    DispatchError, DomainError, EmbeddingError, ErrorClass, PipelineError, PipelineFailure,
    PromptBudgetExceeded, ProviderAttempt, ProviderError, Result, RetrievalError,
};
