use async_trait::async_trait;

use crate::domain::{ports::Reranker, ScoredChunk};

/// Keeps the vector-similarity order.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReranker;

#[async_trait]
impl Reranker for NoopReranker {
    fn name(&self) -> &str {
        "noop"
    }

    async fn rerank(&self, _query: &str, entries: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
        entries
    }
}
