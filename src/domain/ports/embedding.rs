use crate::domain::{errors::EmbeddingError, Embedding};
use async_trait::async_trait;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;
    /// One embedding per input, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError>;
    fn dimension(&self) -> usize;
    fn model_id(&self) -> &str;
}
