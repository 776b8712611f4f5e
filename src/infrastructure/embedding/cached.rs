use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::{ports::Embedder, Embedding, EmbeddingError};

struct CacheEntry {
    embedding: Embedding,
    last_used: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    clock: u64,
}

/// Bounded least-recently-used cache in front of any embedder.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    capacity: usize,
    state: Mutex<CacheState>,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, text: &str) -> Option<Embedding> {
        let mut state = self.state.lock().ok()?;
        state.clock += 1;
        let now = state.clock;
        state.entries.get_mut(text).map(|entry| {
            entry.last_used = now;
            entry.embedding.clone()
        })
    }

    fn store(&self, text: &str, embedding: &Embedding) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.clock += 1;
        let now = state.clock;

        if !state.entries.contains_key(text) && state.entries.len() >= self.capacity {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            if let Some(key) = oldest {
                state.entries.remove(&key);
            }
        }

        state.entries.insert(
            text.to_string(),
            CacheEntry {
                embedding: embedding.clone(),
                last_used: now,
            },
        );
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        if let Some(hit) = self.lookup(text) {
            return Ok(hit);
        }
        let embedding = self.inner.embed(text).await?;
        self.store(text, &embedding);
        Ok(embedding)
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        let mut results: Vec<Option<Embedding>> = texts.iter().map(|t| self.lookup(t)).collect();
        let missing: Vec<usize> = (0..texts.len()).filter(|&i| results[i].is_none()).collect();

        if !missing.is_empty() {
            let to_embed: Vec<&str> = missing.iter().map(|&i| texts[i]).collect();
            let fresh = self.inner.embed_batch(&to_embed).await?;
            if fresh.len() != missing.len() {
                return Err(EmbeddingError::provider(format!(
                    "expected {} embeddings, got {}",
                    missing.len(),
                    fresh.len()
                )));
            }
            for (i, embedding) in missing.into_iter().zip(fresh) {
                self.store(texts[i], &embedding);
                results[i] = Some(embedding);
            }
        }

        results
            .into_iter()
            .map(|e| e.ok_or_else(|| EmbeddingError::provider("embedding missing from batch")))
            .collect()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}
