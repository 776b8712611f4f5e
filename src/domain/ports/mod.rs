mod document_store;
mod embedding;
mod llm;
mod reranker;

pub use document_store::{ChunkCursor, DocumentStore, IndexKind, StoreStats};
pub use embedding::Embedder;
pub use llm::LlmProvider;
pub use reranker::Reranker;
