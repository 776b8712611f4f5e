use async_trait::async_trait;
use std::collections::HashSet;

use crate::domain::{ports::Reranker, ScoredChunk};
use crate::infrastructure::embedding::tokenize;

/// Blends the vector score with the share of query terms found in the chunk.
#[derive(Debug, Clone)]
pub struct LexicalReranker {
    weight: f32,
}

impl LexicalReranker {
    pub fn new(weight: f32) -> Self {
        Self {
            weight: weight.clamp(0.0, 1.0),
        }
    }

    fn overlap(query_terms: &HashSet<String>, text: &str) -> f32 {
        if query_terms.is_empty() {
            return 0.0;
        }
        let chunk_terms: HashSet<String> = tokenize(text).collect();
        let shared = query_terms.intersection(&chunk_terms).count();
        shared as f32 / query_terms.len() as f32
    }
}

impl Default for LexicalReranker {
    fn default() -> Self {
        Self::new(0.3)
    }
}

#[async_trait]
impl Reranker for LexicalReranker {
    fn name(&self) -> &str {
        "lexical"
    }

    async fn rerank(&self, query: &str, entries: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
        let query_terms: HashSet<String> = tokenize(query).collect();

        let mut rescored: Vec<ScoredChunk> = entries
            .into_iter()
            .map(|entry| {
                let lexical = Self::overlap(&query_terms, &entry.chunk.text);
                let score = (1.0 - self.weight) * entry.score + self.weight * lexical;
                ScoredChunk::new(entry.chunk, score.clamp(0.0, 1.0))
            })
            .collect();

        rescored.sort_by(|a, b| b.score.total_cmp(&a.score));
        rescored
    }
}
