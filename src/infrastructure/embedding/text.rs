use async_trait::async_trait;
use rig::client::{EmbeddingsClient, ProviderClient};
use rig::embeddings::EmbeddingsBuilder;
use rig::providers::openai;

use crate::domain::{ports::Embedder, Embedding, EmbeddingError};
use crate::infrastructure::config::EmbeddingConfig;

/// Remote embeddings through the OpenAI API. Reads `OPENAI_API_KEY`.
pub struct RigEmbedder {
    model: String,
    dimension: usize,
}

impl RigEmbedder {
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            model: config.model.clone(),
            dimension: config.dimension,
        }
    }

    fn to_embedding(&self, vec: Vec<f64>) -> Result<Embedding, EmbeddingError> {
        if vec.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: vec.len(),
            });
        }
        Ok(Embedding::new(vec.into_iter().map(|x| x as f32).collect()))
    }
}

#[async_trait]
impl Embedder for RigEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let mut embeddings = self.embed_batch(&[text]).await?;
        embeddings
            .pop()
            .ok_or_else(|| EmbeddingError::provider("No embedding returned"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::EmptyInput);
        }

        let client = openai::Client::from_env();
        let model = client.embedding_model(&self.model);

        let mut builder = EmbeddingsBuilder::new(model);
        for text in texts {
            builder = builder
                .document(text.to_string())
                .map_err(|e| EmbeddingError::provider(e.to_string()))?;
        }

        let embeddings = builder
            .build()
            .await
            .map_err(|e| EmbeddingError::provider(e.to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::provider(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        embeddings
            .into_iter()
            .map(|(_doc, emb)| self.to_embedding(emb.first().vec))
            .collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_vectors_of_the_wrong_width() {
        let embedder = RigEmbedder::from_config(&EmbeddingConfig {
            dimension: 3,
            ..EmbeddingConfig::default()
        });

        assert_eq!(embedder.to_embedding(vec![0.5, 0.25, 1.0]).unwrap().dimension(), 3);
        assert!(matches!(
            embedder.to_embedding(vec![0.5; 4]),
            Err(EmbeddingError::DimensionMismatch { expected: 3, actual: 4 })
        ));
    }

    #[tokio::test]
    async fn test_blank_text_is_rejected_before_any_request() {
        let embedder = RigEmbedder::from_config(&EmbeddingConfig::default());
        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
        assert!(matches!(
            embedder.embed_batch(&["ok", "  "]).await,
            Err(EmbeddingError::EmptyInput)
        ));
    }
}
