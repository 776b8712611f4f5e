mod cancellation;
mod ingestion;
mod orchestrator;
mod prompt;
mod registry;
mod retriever;

pub use cancellation::{CancellationHandle, CancellationToken};
pub use ingestion::{IngestionOptions, IngestionOutcome, IngestionReport, IngestionService};
pub use orchestrator::PipelineOrchestrator;
pub use prompt::{AssembledPrompt, PromptAssembler, PromptTemplate, PromptTemplates};
pub use registry::{Dispatched, Outcome, ProviderRegistry, RegistryPolicy};
pub use retriever::Retriever;
