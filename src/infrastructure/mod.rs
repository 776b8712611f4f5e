pub mod config;
pub mod embedding;
pub mod index;
pub mod llm;
pub mod rerank;
pub mod store;

pub use config::{AppConfig, Config, ConfigError};
pub use embedding::{embedder_from_config, CachedEmbedder, HashingEmbedder, RigEmbedder};
pub use llm::{RigProvider, Vendor};
pub use rerank::{reranker_from_config, LexicalReranker, NoopReranker};
pub use store::InMemoryDocumentStore;
