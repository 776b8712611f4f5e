use crate::domain::ScoredChunk;
use async_trait::async_trait;

/// Reorders retrieved entries. Implementations must return the same chunks
/// they were given.
#[async_trait]
pub trait Reranker: Send + Sync {
    fn name(&self) -> &str;
    async fn rerank(&self, query: &str, entries: Vec<ScoredChunk>) -> Vec<ScoredChunk>;
}
