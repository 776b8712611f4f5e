use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    errors::{DomainError, RetrievalError},
    Chunk, Document, Embedding, MetadataFilter, ScoredChunk, SimilarityMetric,
};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Stores every chunk of `doc` or none of them.
    async fn put(&self, doc: Document) -> Result<(), DomainError>;
    async fn get(&self, id: Uuid) -> Result<Arc<Chunk>, DomainError>;
    /// Removes all chunks of a source, returning how many were removed.
    async fn delete(&self, source_ref: &str) -> Result<usize, DomainError>;
    async fn clear(&self) -> Result<usize, DomainError>;
    async fn persist(&self) -> Result<(), RetrievalError>;
    async fn load(&self) -> Result<(), RetrievalError>;
    /// Candidate chunks scored in `[0, 1]`, best first, at most `k`.
    async fn search(
        &self,
        query: &Embedding,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredChunk>, RetrievalError>;
    fn all_chunks(&self) -> Result<ChunkCursor, DomainError>;
    fn stats(&self) -> Result<StoreStats, DomainError>;
    fn dimension(&self) -> usize;
    fn metric(&self) -> SimilarityMetric;
}

/// Iterator over a snapshot of stored chunks in insertion order.
///
/// Cloning yields a cursor positioned at the start of the same snapshot, so a
/// consumer can restart a pass without re-reading the store.
#[derive(Debug)]
pub struct ChunkCursor {
    snapshot: Arc<[Arc<Chunk>]>,
    position: usize,
}

impl ChunkCursor {
    pub fn new(chunks: Vec<Arc<Chunk>>) -> Self {
        Self {
            snapshot: chunks.into(),
            position: 0,
        }
    }

    pub fn total(&self) -> usize {
        self.snapshot.len()
    }
}

impl Clone for ChunkCursor {
    fn clone(&self) -> Self {
        Self {
            snapshot: Arc::clone(&self.snapshot),
            position: 0,
        }
    }
}

impl Iterator for ChunkCursor {
    type Item = Arc<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk = self.snapshot.get(self.position).cloned();
        if chunk.is_some() {
            self.position += 1;
        }
        chunk
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.snapshot.len() - self.position;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChunkCursor {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Exact,
    Ivf,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    pub chunks: usize,
    pub sources: usize,
    pub dimension: usize,
    pub metric: SimilarityMetric,
    pub index: IndexKind,
}
