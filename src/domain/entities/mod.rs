mod chunking;
mod conversation;
mod document;
mod embedding;
mod language;
mod pipeline;
mod provider;
mod retrieval;

pub use chunking::{ChunkingPolicy, Granularity};
pub use conversation::{recent_turns, Message, MessageRole};
pub use document::{Chunk, Document, Metadata, MetadataValue, RawDocument};
pub use embedding::{Embedding, SimilarityMetric};
pub use language::Language;
pub use pipeline::{
    Citation, PipelineRequest, PipelineResponse, PipelineState, QueryOptions,
};
pub use provider::{Capability, CapabilitySet, GenerateOptions, HealthState, ProviderDescriptor};
pub use retrieval::{Condition, MetadataFilter, RetrievalResult, ScoredChunk};
