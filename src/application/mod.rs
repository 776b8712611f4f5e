//! Application layer - Use cases and orchestration.
//!
//! Services depend on domain ports (traits) rather than concrete
//! implementations.

pub mod retry;
pub mod services;

pub use retry::{classify_provider_error, execute_with_retry, RetryConfig};
pub use services::{
    AssembledPrompt, CancellationHandle, CancellationToken, Dispatched, IngestionOptions,
    IngestionOutcome, IngestionReport, IngestionService, Outcome, PipelineOrchestrator,
    PromptAssembler, PromptTemplate, PromptTemplates, ProviderRegistry, RegistryPolicy,
    Retriever,
};
